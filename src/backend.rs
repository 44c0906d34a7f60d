//!
//! Execution backends of the per-frame work
//!
//! Within one frame every (history-state, sequence) cell is independent of the
//! others, so the same kernel can run either as a plain loop (`Sequential`) or
//! fanned out over rayon's thread pool (`Parallel`). Both executors visit the
//! cells with identical arithmetic, so their results are bit-for-bit equal.
//!
//! Frames themselves are always processed in order by the caller.
//!
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

///
/// Strategy that runs independent cells of a frame.
///
/// * `fill`
///     `out[i] = f(i)` for every `i`
/// * `map_lanes`
///     `[f(0), f(1), ..., f(n_lanes - 1)]`
/// * `for_each_chunk`
///     `f(i, chunk_i)` for the first `n_chunks` chunks of `data`
///
pub trait Executor: Sync {
    fn fill<T, F>(&self, out: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize) -> T + Sync;
    fn map_lanes<T, F>(&self, n_lanes: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync;
    fn for_each_chunk<T, F>(&self, data: &mut [T], chunk_size: usize, n_chunks: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync;
    ///
    /// Does this executor run cells concurrently?
    fn is_parallel(&self) -> bool;
}

///
/// Ordinary iteration on the calling thread
///
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl Executor for Sequential {
    fn fill<T, F>(&self, out: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        for (i, x) in out.iter_mut().enumerate() {
            *x = f(i);
        }
    }
    fn map_lanes<T, F>(&self, n_lanes: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        (0..n_lanes).map(f).collect()
    }
    fn for_each_chunk<T, F>(&self, data: &mut [T], chunk_size: usize, n_chunks: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        assert!(chunk_size > 0);
        for (i, chunk) in data.chunks_mut(chunk_size).take(n_chunks).enumerate() {
            f(i, chunk);
        }
    }
    fn is_parallel(&self) -> bool {
        false
    }
}

///
/// Data-parallel execution on rayon's global thread pool
///
/// A panic in any lane (e.g. the NaN check of the forward pass) is propagated
/// to the caller once the frame is joined.
///
#[derive(Debug, Clone, Copy, Default)]
pub struct Parallel;

impl Executor for Parallel {
    fn fill<T, F>(&self, out: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        out.par_iter_mut().enumerate().for_each(|(i, x)| *x = f(i));
    }
    fn map_lanes<T, F>(&self, n_lanes: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        (0..n_lanes).into_par_iter().map(|i| f(i)).collect()
    }
    fn for_each_chunk<T, F>(&self, data: &mut [T], chunk_size: usize, n_chunks: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        assert!(chunk_size > 0);
        data.par_chunks_mut(chunk_size)
            .take(n_chunks)
            .enumerate()
            .for_each(|(i, chunk)| f(i, chunk));
    }
    fn is_parallel(&self) -> bool {
        true
    }
}

///
/// Capability flag selecting the executor at runtime
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sequential,
    Parallel,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Sequential
    }
}

impl Executor for Backend {
    fn fill<T, F>(&self, out: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        match self {
            Backend::Sequential => Sequential.fill(out, f),
            Backend::Parallel => Parallel.fill(out, f),
        }
    }
    fn map_lanes<T, F>(&self, n_lanes: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        match self {
            Backend::Sequential => Sequential.map_lanes(n_lanes, f),
            Backend::Parallel => Parallel.map_lanes(n_lanes, f),
        }
    }
    fn for_each_chunk<T, F>(&self, data: &mut [T], chunk_size: usize, n_chunks: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        match self {
            Backend::Sequential => Sequential.for_each_chunk(data, chunk_size, n_chunks, f),
            Backend::Parallel => Parallel.for_each_chunk(data, chunk_size, n_chunks, f),
        }
    }
    fn is_parallel(&self) -> bool {
        match self {
            Backend::Sequential => false,
            Backend::Parallel => true,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Backend::Sequential => write!(f, "sequential"),
            Backend::Parallel => write!(f, "parallel"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" | "cpu" => Ok(Backend::Sequential),
            "parallel" => Ok(Backend::Parallel),
            _ => Err(format!("unknown backend: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Backend::Sequential ; "sequential")]
    #[test_case(Backend::Parallel ; "parallel")]
    fn backend_fill_and_lanes(backend: Backend) {
        let mut out = vec![0usize; 100];
        backend.fill(&mut out, |i| i * i);
        assert!(out.iter().enumerate().all(|(i, &x)| x == i * i));

        let lanes = backend.map_lanes(7, |s| s + 1);
        assert_eq!(lanes, vec![1, 2, 3, 4, 5, 6, 7]);

        // the kernel only has to be Sync: a MutexGuard is Sync but not Send
        let factor = std::sync::Mutex::new(3usize);
        let guard = factor.lock().unwrap();
        let lanes = backend.map_lanes(4, move |s| s * *guard);
        assert_eq!(lanes, vec![0, 3, 6, 9]);
    }
    #[test_case(Backend::Sequential ; "sequential")]
    #[test_case(Backend::Parallel ; "parallel")]
    fn backend_chunks(backend: Backend) {
        let mut data = vec![0u32; 10];
        // only the first 3 chunks of size 3 are visited
        backend.for_each_chunk(&mut data, 3, 3, |i, chunk| {
            for x in chunk.iter_mut() {
                *x = i as u32 + 1;
            }
        });
        assert_eq!(data, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 0]);
    }
    #[test]
    fn backend_flag_parse() {
        assert_eq!("parallel".parse::<Backend>(), Ok(Backend::Parallel));
        assert_eq!("cpu".parse::<Backend>(), Ok(Backend::Sequential));
        assert!("cuda".parse::<Backend>().is_err());
        assert_eq!(Backend::Parallel.to_string(), "parallel");
        assert!(Backend::Parallel.is_parallel());
        assert!(!Backend::default().is_parallel());
    }
}
