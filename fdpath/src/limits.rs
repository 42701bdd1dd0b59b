/// A descriptor table declaring more slots than this is treated as corrupt.
pub const MAX_FDS: u64 = 500_000;

/// Hops allowed while walking from a dentry up to the process root.
pub const MAX_PATH_HOPS: usize = 4096;

/// Longest dentry name the kernel allows (NAME_MAX).
pub const MAX_NAME_LEN: usize = 255;

/// Bounds on the work done against possibly corrupt structures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub max_path_hops: usize,
    pub max_fds: u64,
    pub max_name_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_path_hops: MAX_PATH_HOPS,
            max_fds: MAX_FDS,
            max_name_len: MAX_NAME_LEN,
        }
    }
}

impl Limits {
    pub fn with_max_path_hops(mut self, hops: usize) -> Self {
        self.max_path_hops = hops;
        self
    }

    /// Sets the descriptor count above which a table is ignored.
    pub fn with_max_fds(mut self, max_fds: u64) -> Self {
        self.max_fds = max_fds;
        self
    }

    pub fn with_max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }
}
