use crate::errors::Result;
use crate::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_PAGES};
use std::env;

const PAGE_SIZE_VAR: &str = "HEAPDB_PAGE_SIZE";
const POOL_PAGES_VAR: &str = "HEAPDB_POOL_PAGES";

/// Sizing knobs for a database context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Bytes per page, on disk and in memory.
    pub page_size: usize,
    /// Maximum number of pages resident in the buffer pool.
    pub pool_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_pages: DEFAULT_POOL_PAGES,
        }
    }
}

impl Config {
    pub fn new(page_size: usize, pool_pages: usize) -> Result<Self> {
        if page_size == 0 {
            bail!("page size must be positive")
        }
        if pool_pages == 0 {
            bail!("buffer pool must hold at least one page")
        }
        Ok(Self {
            page_size,
            pool_pages,
        })
    }

    /// Defaults overridden by `HEAPDB_PAGE_SIZE` / `HEAPDB_POOL_PAGES` when set.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let page_size = read_var(PAGE_SIZE_VAR)?.unwrap_or(defaults.page_size);
        let pool_pages = read_var(POOL_PAGES_VAR)?.unwrap_or(defaults.pool_pages);
        Self::new(page_size, pool_pages)
    }
}

fn read_var(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse::<usize>()
                .map_err(|e| anyhow!("{}={:?} is not a valid size: {}", name, raw, e))?;
            Ok(Some(value))
        }
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(anyhow!("{} is unreadable: {}", name, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn defaults_match_documented_sizes() {
        let config = Config::default();
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.pool_pages, 50);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(Config::new(0, 10).is_err());
        assert!(Config::new(4096, 0).is_err());
        assert!(Config::new(512, 3).is_ok());
    }
}
