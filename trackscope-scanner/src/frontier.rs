use std::collections::{HashSet, VecDeque};
use tracing::debug;
use url::Url;

/// Extensions of files that are never HTML pages.
const RESOURCE_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "tif", "tiff", "avif",
    // styles, scripts, data
    "css", "js", "mjs", "map", "json", "xml", "txt", "csv",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "rtf",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // media
    "mp3", "mp4", "wav", "ogg", "webm", "avi", "mov", "m4a", "flac",
    // archives and binaries
    "zip", "tar", "gz", "tgz", "rar", "7z", "exe", "dmg", "msi", "apk", "iso", "bin",
];

/// Path segments of endpoints that are not content pages (feeds, APIs, tags).
const NON_PAGE_SEGMENTS: &[&str] = &[
    "feed", "rss", "atom", "api", "wp-json", "wp-admin", "xmlrpc.php", "tag", "tags", "cdn-cgi",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierItem {
    pub url: String,
    pub depth: usize,
    pub parent_url: Option<String>,
}

impl FrontierItem {
    pub fn root(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 0,
            parent_url: None,
        }
    }

    /// An item discovered on `self`, one level deeper.
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: self.depth + 1,
            parent_url: Some(self.url.clone()),
        }
    }
}

/// Normalize a URL for comparison: no fragment, no trailing slash except the
/// root path, query parameters sorted lexicographically.
///
/// Returns `None` for anything `url` cannot parse.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
        if url.path().is_empty() {
            url.set_path("/");
        }
    }

    Some(url.to_string())
}

/// Whether a URL points at a static asset or a non-page endpoint.
pub fn is_resource_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    let path = url.path().to_lowercase();

    if let Some(last) = path.rsplit('/').next()
        && let Some((_, ext)) = last.rsplit_once('.')
        && RESOURCE_EXTENSIONS.contains(&ext)
    {
        return true;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| NON_PAGE_SEGMENTS.contains(s)) {
        return true;
    }

    // pagination: .../page/2
    segments
        .windows(2)
        .any(|w| w[0] == "page" && w[1].parse::<u32>().is_ok())
}

/// FIFO queue of discovered URLs plus the set of already-visited canonical URLs
/// for a single host. One frontier lives exactly as long as one crawl.
///
/// The same canonical URL may be queued more than once until it is marked
/// visited; only the visited check at enqueue time prevents re-crawls.
#[derive(Debug)]
pub struct Frontier {
    base_host: String,
    queue: VecDeque<FrontierItem>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new(base_host: impl Into<String>) -> Self {
        Self {
            base_host: base_host.into().to_lowercase(),
            queue: VecDeque::new(),
            visited: HashSet::new(),
        }
    }

    /// Build a frontier scoped to the host of `start_url`.
    pub fn for_url(start_url: &str) -> Option<Self> {
        let url = Url::parse(start_url).ok()?;
        url.host_str().map(Self::new)
    }

    pub fn base_host(&self) -> &str {
        &self.base_host
    }

    /// Queue an item if it is in scope and unvisited. The stored URL is canonical.
    pub fn enqueue(&mut self, item: FrontierItem) -> bool {
        let Some(canonical) = canonicalize_url(&item.url) else {
            debug!("Rejecting unparseable URL {}", item.url);
            return false;
        };

        if self.visited.contains(&canonical) {
            debug!("Rejecting visited URL {}", canonical);
            return false;
        }

        let same_host = Url::parse(&canonical)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
            .is_some_and(|host| host == self.base_host);
        if !same_host {
            debug!("Rejecting out-of-scope URL {} (base: {})", canonical, self.base_host);
            return false;
        }

        if is_resource_url(&canonical) {
            debug!("Rejecting resource URL {}", canonical);
            return false;
        }

        self.queue.push_back(FrontierItem {
            url: canonical,
            ..item
        });
        true
    }

    pub fn dequeue(&mut self) -> Option<FrontierItem> {
        self.queue.pop_front()
    }

    pub fn mark_visited(&mut self, url: &str) {
        if let Some(canonical) = canonicalize_url(url) {
            self.visited.insert(canonical);
        }
    }

    pub fn is_visited(&self, url: &str) -> bool {
        canonicalize_url(url).is_some_and(|c| self.visited.contains(&c))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontier() -> Frontier {
        Frontier::new("example.com")
    }

    #[test]
    fn test_canonicalize_strips_fragment_and_trailing_slash() {
        assert_eq!(
            canonicalize_url("https://example.com/about/#team").unwrap(),
            "https://example.com/about"
        );
    }

    #[test]
    fn test_canonicalize_keeps_root_slash() {
        assert_eq!(
            canonicalize_url("https://example.com").unwrap(),
            "https://example.com/"
        );
        assert_eq!(
            canonicalize_url("https://example.com/#top").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_canonicalize_sorts_query() {
        assert_eq!(
            canonicalize_url("https://example.com/search?z=1&a=2&m=3").unwrap(),
            "https://example.com/search?a=2&m=3&z=1"
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let inputs = [
            "https://example.com/a/b/?q=1&b=2#frag",
            "https://example.com",
            "https://example.com/x//",
            "https://example.com/path%20with%20space/?q=a+b",
            "https://example.com/?",
        ];
        for input in inputs {
            let once = canonicalize_url(input).unwrap();
            let twice = canonicalize_url(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", input);
        }
    }

    #[test]
    fn test_resource_filter() {
        assert!(is_resource_url("https://example.com/image.jpg"));
        assert!(is_resource_url("https://example.com/assets/style.css"));
        assert!(is_resource_url("https://example.com/files/doc.pdf"));
        assert!(is_resource_url("https://example.com/fonts/font.woff2"));
        assert!(is_resource_url("https://example.com/feed"));
        assert!(is_resource_url("https://example.com/blog/page/2"));
        assert!(is_resource_url("https://example.com/tag/privacy"));
        assert!(is_resource_url("https://example.com/api/users"));
        assert!(!is_resource_url("https://example.com/path/to/deep/page"));
        assert!(!is_resource_url("https://example.com/"));
        assert!(!is_resource_url("https://example.com/pages/about"));
        assert!(!is_resource_url("https://example.com/feedback"));
        assert!(!is_resource_url("https://example.com/page/contact"));
    }

    #[test]
    fn test_resource_filter_only_checks_last_segment_extension() {
        assert!(!is_resource_url("https://example.com/v1.2/page"));
        assert!(!is_resource_url("https://example.com/docs/release-2.0/notes"));
        assert!(!is_resource_url("https://example.com/jquery.js/overview"));
        assert!(is_resource_url("https://example.com/v1.2/bundle.js"));
    }

    #[test]
    fn test_enqueue_rejects_other_hosts() {
        let mut f = frontier();
        assert!(!f.enqueue(FrontierItem::root("https://other.com/")));
        assert!(!f.enqueue(FrontierItem::root("https://blog.example.com/")));
        assert!(!f.enqueue(FrontierItem::root("https://notexample.com/")));
        assert!(f.enqueue(FrontierItem::root("https://example.com/")));
    }

    #[test]
    fn test_enqueue_rejects_visited() {
        let mut f = frontier();
        f.mark_visited("https://example.com/about/");
        assert!(!f.enqueue(FrontierItem::root("https://example.com/about")));
        assert!(!f.enqueue(FrontierItem::root("https://example.com/about#x")));
    }

    #[test]
    fn test_enqueue_rejects_garbage() {
        let mut f = frontier();
        assert!(!f.enqueue(FrontierItem::root("not a url")));
        assert!(f.is_empty());
    }

    #[test]
    fn test_duplicates_allowed_until_visited() {
        let mut f = frontier();
        assert!(f.enqueue(FrontierItem::root("https://example.com/a")));
        assert!(f.enqueue(FrontierItem::root("https://example.com/a/")));
        assert_eq!(f.len(), 2);

        f.mark_visited("https://example.com/a");
        assert!(!f.enqueue(FrontierItem::root("https://example.com/a")));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_dequeue_is_fifo() {
        let mut f = frontier();
        assert!(f.dequeue().is_none());

        for path in ["/one", "/two", "/three"] {
            f.enqueue(FrontierItem::root(format!("https://example.com{}", path)));
        }
        let order: Vec<String> = std::iter::from_fn(|| f.dequeue()).map(|i| i.url).collect();
        assert_eq!(
            order,
            vec![
                "https://example.com/one",
                "https://example.com/two",
                "https://example.com/three"
            ]
        );
        assert!(f.dequeue().is_none());
    }

    #[test]
    fn test_child_depth_and_parent() {
        let root = FrontierItem::root("https://example.com/");
        let child = root.child("https://example.com/a");
        let grandchild = child.child("https://example.com/a/b");
        assert_eq!(child.depth, 1);
        assert_eq!(grandchild.depth, 2);
        assert_eq!(grandchild.parent_url.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn test_mark_visited_is_idempotent() {
        let mut f = frontier();
        f.mark_visited("https://example.com/x");
        f.mark_visited("https://example.com/x/");
        f.mark_visited("https://example.com/x#y");
        assert_eq!(f.visited_count(), 1);
        assert!(f.is_visited("https://example.com/x"));
    }

    #[test]
    fn test_for_url_uses_exact_host() {
        let f = Frontier::for_url("https://www.example.com/start").unwrap();
        assert_eq!(f.base_host(), "www.example.com");
        assert!(Frontier::for_url("nope").is_none());
    }
}
