use crate::error::Result;
use crate::render::{RenderOptions, Renderer};
use crate::scope::{ScopePolicy, allowed, is_crawlable_scheme, normalize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Called with (discovered so far, url being processed).
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    Running,
    Done,
}

/// Frontier of a single breadth-first crawl.
///
/// Every queued URL is already in `seen`, and `seen` never grows past
/// `max_pages`.
#[derive(Debug)]
pub struct CrawlState {
    queue: VecDeque<String>,
    seen: HashSet<String>,
    discovered: Vec<String>,
    max_pages: usize,
    phase: CrawlPhase,
}

impl CrawlState {
    pub fn new(start_url: &str, max_pages: usize) -> Self {
        let mut state = Self {
            queue: VecDeque::new(),
            seen: HashSet::new(),
            discovered: Vec::new(),
            max_pages,
            phase: CrawlPhase::Idle,
        };

        match normalize(start_url, None) {
            Some(start) => {
                state.admit(start);
            }
            None => warn!("Start URL {:?} could not be normalized, nothing to crawl", start_url),
        }

        state
    }

    /// Mark `url` as seen and enqueue it. Returns false if it was already seen
    /// or the page ceiling has been reached.
    fn admit(&mut self, url: String) -> bool {
        if self.is_full() || self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.discovered.push(url.clone());
        self.queue.push_back(url);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn is_full(&self) -> bool {
        self.seen.len() >= self.max_pages
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Discovered URLs in insertion order.
    pub fn discovered(&self) -> &[String] {
        &self.discovered
    }

    pub fn into_discovered(self) -> Vec<String> {
        self.discovered
    }
}

pub struct Crawler {
    policy: ScopePolicy,
    max_pages: usize,
    render_options: RenderOptions,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(policy: ScopePolicy) -> Self {
        Self {
            policy,
            max_pages: 50,
            render_options: RenderOptions::default(),
            progress_callback: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn policy(&self) -> &ScopePolicy {
        &self.policy
    }

    /// Discover in-scope pages starting at `start_url`.
    ///
    /// The traversal is sequential so the page ceiling is applied
    /// deterministically. A page whose expansion fails still counts as
    /// discovered; it simply contributes no links.
    pub async fn crawl<R: Renderer>(&self, renderer: &R, start_url: &str) -> Vec<String> {
        info!(
            "Starting crawl of {} (max {} pages)",
            start_url, self.max_pages
        );

        let mut state = CrawlState::new(start_url, self.max_pages);
        state.phase = CrawlPhase::Running;

        while !state.is_full() {
            let Some(url) = state.queue.pop_front() else {
                break;
            };

            if let Some(ref callback) = self.progress_callback {
                callback(state.seen_count(), url.clone());
            }

            let (final_url, links) = match self.expand(renderer, &url).await {
                Ok(expanded) => expanded,
                Err(e) => {
                    warn!("Link expansion failed for {}: {}", url, e);
                    (url.clone(), Vec::new())
                }
            };

            // Relative links resolve against where the page actually ended up
            let base = match Url::parse(&final_url).or_else(|_| Url::parse(&url)) {
                Ok(base) => base,
                Err(_) => continue,
            };

            for href in links {
                if state.is_full() {
                    break;
                }
                let Some(candidate) = normalize(&href, Some(&base)) else {
                    continue;
                };
                if !is_crawlable_scheme(&candidate) || state.contains(&candidate) {
                    continue;
                }
                if !allowed(&candidate, &self.policy) {
                    debug!("  -> Out of scope: {}", candidate);
                    continue;
                }
                debug!("  -> Queuing {}", candidate);
                state.admit(candidate);
            }
        }

        state.phase = CrawlPhase::Done;
        info!(
            "Crawl complete. Discovered {} pages ({} never expanded)",
            state.seen_count(),
            state.queued_count()
        );

        state.into_discovered()
    }

    /// Render `url` and return the final page URL along with its raw links.
    async fn expand<R: Renderer>(&self, renderer: &R, url: &str) -> Result<(String, Vec<String>)> {
        debug!("Expanding {}", url);
        let page = renderer.render(url, &self.render_options).await?;
        if page.url != url {
            debug!("  -> {} landed on {}", url, page.url);
        }
        Ok((page.url, page.links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HttpRenderer;
    use crate::robots::RobotsRules;
    use crate::testing::FakeRenderer;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const START: &str = "https://x.test/";

    fn crawler() -> Crawler {
        Crawler::new(ScopePolicy::new(START))
    }

    #[test]
    fn test_crawl_state_initialisation() {
        let state = CrawlState::new("https://x.test/a/#top", 10);
        assert_eq!(state.phase(), CrawlPhase::Idle);
        assert_eq!(state.discovered(), ["https://x.test/a"]);
        assert_eq!(state.queued_count(), 1);

        let broken = CrawlState::new("::not a url::", 10);
        assert_eq!(broken.seen_count(), 0);
        assert_eq!(broken.queued_count(), 0);

        let zero = CrawlState::new(START, 0);
        assert_eq!(zero.seen_count(), 0);
    }

    #[tokio::test]
    async fn test_single_page_without_links() {
        let renderer = FakeRenderer::new(&[(START, &[])]);
        let urls = crawler().crawl(&renderer, START).await;
        assert_eq!(urls, vec![START]);
    }

    #[tokio::test]
    async fn test_max_pages_caps_discovery() {
        let renderer = FakeRenderer::new(&[(START, &["/a", "/b", "/c", "/d", "/e"])]);
        let urls = crawler().with_max_pages(2).crawl(&renderer, START).await;

        assert_eq!(urls, vec![START, "https://x.test/a"]);
        // the cap is reached while processing the root, so /a is never expanded
        assert_eq!(renderer.rendered(), vec![START]);
    }

    #[tokio::test]
    async fn test_include_and_exclude_patterns() {
        let renderer = FakeRenderer::new(&[(
            START,
            &["/blog/post", "/blog/drafts/1", "/about"],
        )]);
        let policy = ScopePolicy::new(START)
            .with_include(Some("*/blog/*"))
            .with_exclude(Some("*/blog/drafts/*"));

        let urls = Crawler::new(policy).crawl(&renderer, START).await;
        assert_eq!(urls, vec![START, "https://x.test/blog/post"]);
    }

    #[tokio::test]
    async fn test_robots_disallowed_paths_never_discovered() {
        let renderer = FakeRenderer::new(&[
            (START, &["/private", "/private/report", "/public"]),
            ("https://x.test/public", &["/private/other", "/public/deeper"]),
        ]);
        let robots = RobotsRules::parse("User-agent: *\nDisallow: /private\n");
        let policy = ScopePolicy::new(START).with_robots(Some(robots));

        let urls = Crawler::new(policy).crawl(&renderer, START).await;
        assert!(urls.iter().all(|u| !u.contains("/private")));
        assert_eq!(
            urls,
            vec![START, "https://x.test/public", "https://x.test/public/deeper"]
        );
    }

    #[tokio::test]
    async fn test_dedup_and_normalization() {
        let renderer = FakeRenderer::new(&[
            (START, &["/a", "/a/", "/a#frag", "https://x.test/a", "/b"]),
            ("https://x.test/a", &["/", "/b/", "../a"]),
        ]);

        let urls = crawler().crawl(&renderer, START).await;
        assert_eq!(urls, vec![START, "https://x.test/a", "https://x.test/b"]);

        let unique: HashSet<_> = urls.iter().collect();
        assert_eq!(unique.len(), urls.len());
    }

    #[tokio::test]
    async fn test_cross_origin_and_non_http_links_skipped() {
        let renderer = FakeRenderer::new(&[(
            START,
            &[
                "https://other.test/page",
                "mailto:team@x.test",
                "javascript:void(0)",
                "http://[broken",
                "/ok",
            ],
        )]);

        let urls = crawler().crawl(&renderer, START).await;
        assert_eq!(urls, vec![START, "https://x.test/ok"]);

        let open = Crawler::new(ScopePolicy::new(START).with_same_origin(false));
        let urls = open.crawl(&renderer, START).await;
        assert!(urls.contains(&"https://other.test/page".to_string()));
        assert!(!urls.iter().any(|u| u.starts_with("mailto:")));
    }

    #[tokio::test]
    async fn test_expansion_failure_keeps_page_and_continues() {
        let renderer = FakeRenderer::new(&[
            (START, &["/broken", "/fine"]),
            ("https://x.test/broken", &["/never-seen"]),
            ("https://x.test/fine", &["/leaf"]),
        ])
        .failing_on("https://x.test/broken");

        let urls = crawler().crawl(&renderer, START).await;
        assert_eq!(
            urls,
            vec![
                START,
                "https://x.test/broken",
                "https://x.test/fine",
                "https://x.test/leaf"
            ]
        );
    }

    #[tokio::test]
    async fn test_seen_never_exceeds_max_pages() {
        let links: Vec<String> = (0..40).map(|i| format!("/p{}", i)).collect();
        let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
        let renderer = FakeRenderer::new(&[(START, link_refs.as_slice())]);

        for max_pages in [1, 3, 10, 41, 100] {
            let urls = crawler().with_max_pages(max_pages).crawl(&renderer, START).await;
            assert!(urls.len() <= max_pages);
            assert_eq!(urls.len(), max_pages.min(41));
        }
    }

    #[tokio::test]
    async fn test_link_discovery_over_http() {
        let mock_server = MockServer::start().await;

        let root_html = format!(
            r#"<html><body>
                <a href="{}/page1">Page 1</a>
                <a href="/page2/">Page 2</a>
                <a href="https://elsewhere.test/">Elsewhere</a>
            </body></html>"#,
            mock_server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(root_html.as_bytes()),
            )
            .mount(&mock_server)
            .await;

        for page in ["/page1", "/page2"] {
            Mock::given(method("GET"))
                .and(path(page))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "text/html")
                        .set_body_bytes(b"<html><body>Leaf</body></html>"),
                )
                .mount(&mock_server)
                .await;
        }

        let start = format!("{}/", mock_server.uri());
        let renderer = HttpRenderer::new(5_000).unwrap();
        let urls = Crawler::new(ScopePolicy::new(start.clone()))
            .crawl(&renderer, &start)
            .await;

        assert_eq!(
            urls,
            vec![
                start.clone(),
                format!("{}/page1", mock_server.uri()),
                format!("{}/page2", mock_server.uri()),
            ]
        );
    }

    #[tokio::test]
    async fn test_relative_links_resolve_against_redirect_target() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(r#"<html><body><a href="/docs/">Docs</a></body></html>"#),
            )
            .mount(&mock_server)
            .await;

        // Directory-style page: the slashless form redirects to the canonical one
        Mock::given(method("GET"))
            .and(path("/docs"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{}/docs/", uri)),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/docs/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(r#"<html><body><a href="intro">Intro</a></body></html>"#),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/docs/intro"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes("<html><body>Intro</body></html>"),
            )
            .mount(&mock_server)
            .await;

        let start = format!("{}/", uri);
        let renderer = HttpRenderer::new(5_000).unwrap();
        let urls = Crawler::new(ScopePolicy::new(start.clone()))
            .crawl(&renderer, &start)
            .await;

        assert_eq!(
            urls,
            vec![
                start.clone(),
                format!("{}/docs", uri),
                format!("{}/docs/intro", uri),
            ]
        );
        assert!(!urls.contains(&format!("{}/intro", uri)));
    }
}
