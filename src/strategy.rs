//! Cache strategies for property loads.
//!
//! Writes always follow the same discipline (write the store, then evict),
//! so strategies only exist on the read side.
//!
//! | Strategy | Cache Hit | Cache Miss | Use Case |
//! |----------|-----------|------------|----------|
//! | **Refresh** | Return | Load store, fill cache | Default |
//! | **Invalidate** | Evict, load store, fill | Load store, fill cache | Store was written behind the repository's back |
//! | **Bypass** | Ignore | Load store | Diagnostics; cache untouched |

/// Strategy controlling how a load consults the cache.
///
/// ```
/// use entity_props::strategy::CacheStrategy;
///
/// assert_eq!(CacheStrategy::default(), CacheStrategy::Refresh);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// **Refresh**: read-through. Try cache first, load from the store on a
    /// miss and fill the cache.
    #[default]
    Refresh,

    /// **Invalidate**: evict the entry, then behave like `Refresh`.
    Invalidate,

    /// **Bypass**: read the store directly; the cache is neither read nor
    /// filled.
    Bypass,
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStrategy::Refresh => write!(f, "Refresh"),
            CacheStrategy::Invalidate => write!(f, "Invalidate"),
            CacheStrategy::Bypass => write!(f, "Bypass"),
        }
    }
}
