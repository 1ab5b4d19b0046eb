//! Catalog traversal: homepage, categories, product pages, their result pages
//! and the product detail pages listed on them.
//!
//! Link-following is driven by an explicit work queue. Up to `concurrency`
//! branches are in flight at once; the driver loop owns the report and the
//! entity registry and merges each branch outcome as it completes. A failed
//! branch is logged, recorded and skipped while its siblings carry on.

use crate::config::Config;
use crate::crawl::registry::EntityRegistry;
use crate::crawl::retry::RetryPolicy;
use crate::expo::client::PageFetcher;
use crate::expo::error::TraversalError;
use crate::expo::models::{
    BranchKind, Category, CrawlReport, Failure, ProductDetail, ProductLink, ProductPage,
    ProductTile,
};
use crate::expo::parser::{headings_match, Parser};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::task::{Id, JoinSet};
use tracing::{debug, info, warn};

/// Run-wide traversal limits.
#[derive(Debug, Clone, Copy)]
pub struct CrawlSettings {
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub max_categories: Option<usize>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self { concurrency: 4, retry: RetryPolicy::default(), max_categories: None }
    }
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            retry: RetryPolicy::from_config(config),
            max_categories: config.max_categories,
        }
    }
}

enum Job {
    Category(Category),
    Product(ProductLink),
    Listing { link: ProductLink, url: String },
    Detail { tile: ProductTile, url: String },
}

impl Job {
    fn target(&self) -> (BranchKind, String) {
        match self {
            Job::Category(category) => (BranchKind::Category, category.url.clone()),
            Job::Product(link) => (BranchKind::Product, link.url.clone()),
            Job::Listing { url, .. } => (BranchKind::Listing, url.clone()),
            Job::Detail { url, .. } => (BranchKind::Detail, url.clone()),
        }
    }
}

enum Outcome {
    Category { category: Category, result: Result<Vec<ProductLink>, TraversalError> },
    Product { link: ProductLink, result: Result<ProductPage, TraversalError> },
    Listing { url: String, result: Result<Vec<ProductTile>, TraversalError> },
    Detail { url: String, result: Result<ProductDetail, TraversalError> },
}

/// Walks the catalog hierarchy with a [`PageFetcher`].
pub struct Crawler<F> {
    fetcher: Arc<F>,
    parser: Arc<Parser>,
    settings: CrawlSettings,
}

impl<F> Clone for Crawler<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            parser: Arc::clone(&self.parser),
            settings: self.settings,
        }
    }
}

impl<F: PageFetcher + 'static> Crawler<F> {
    pub fn new(fetcher: F, parser: Parser, settings: CrawlSettings) -> Self {
        Self { fetcher: Arc::new(fetcher), parser: Arc::new(parser), settings }
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    async fn fetch(&self, url: &str) -> Result<String, TraversalError> {
        Ok(self.settings.retry.fetch(self.fetcher.as_ref(), url).await?)
    }

    /// Reads every category link in the homepage menu.
    pub async fn traverse_home(&self) -> Result<Vec<Category>, TraversalError> {
        let url = self.parser.base().as_str().to_string();
        let html = self.fetch(&url).await?;
        let categories = self.parser.parse_home(&html)?;
        info!("Found {} categories on the homepage", categories.len());
        Ok(categories)
    }

    /// Opens a category page, checks its heading and reads its product links.
    pub async fn traverse_category(
        &self,
        category: &Category,
    ) -> Result<Vec<ProductLink>, TraversalError> {
        let html = self.fetch(&category.url).await?;
        let page = self.parser.parse_category(&html, category)?;

        if !headings_match(&category.name, &page.heading) {
            return Err(TraversalError::Consistency {
                url: category.url.clone(),
                expected: category.name.clone(),
                found: page.heading,
            });
        }

        Ok(page.links)
    }

    /// Opens a product listing page and checks its heading.
    pub async fn traverse_product(&self, link: &ProductLink) -> Result<ProductPage, TraversalError> {
        let html = self.fetch(&link.url).await?;
        let page = self.parser.parse_product(&html, link)?;

        if !headings_match(&link.name, &page.heading) {
            return Err(TraversalError::Consistency {
                url: link.url.clone(),
                expected: link.name.clone(),
                found: page.heading,
            });
        }

        Ok(page)
    }

    /// Reads the tiles of one further result page of `link`.
    pub async fn traverse_listing_page(
        &self,
        link: &ProductLink,
        url: &str,
    ) -> Result<Vec<ProductTile>, TraversalError> {
        let html = self.fetch(url).await?;
        Ok(self.parser.parse_listing(&html, link, url))
    }

    /// Opens the detail page of one product tile.
    pub async fn traverse_detail(
        &self,
        tile: &ProductTile,
        url: &str,
    ) -> Result<ProductDetail, TraversalError> {
        let html = self.fetch(url).await?;
        Ok(self.parser.parse_detail(&html, tile, url))
    }

    /// Crawls the whole catalog.
    ///
    /// Only a homepage failure fails the run. Every other failure drops its
    /// branch, which is listed in `CrawlReport::failures` instead.
    pub async fn run(&self) -> Result<CrawlReport, TraversalError> {
        let mut categories = self.traverse_home().await?;
        if let Some(max) = self.settings.max_categories {
            if categories.len() > max {
                info!("Limiting run to the first {} categories", max);
                categories.truncate(max);
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<Job> = VecDeque::new();
        for category in &categories {
            if seen.insert(category.url.clone()) {
                queue.push_back(Job::Category(category.clone()));
            } else {
                debug!("Category '{}' already queued", category.name);
            }
        }

        let mut state = RunState::default();
        let mut tasks: JoinSet<Outcome> = JoinSet::new();
        let mut running: HashMap<Id, (BranchKind, String)> = HashMap::new();
        let limit = self.settings.concurrency.max(1);

        loop {
            while tasks.len() < limit {
                let Some(job) = queue.pop_front() else { break };
                let target = job.target();
                let crawler = self.clone();
                let handle = tasks.spawn(async move { crawler.process(job).await });
                running.insert(handle.id(), target);
            }

            let Some(joined) = tasks.join_next_with_id().await else { break };
            match joined {
                Ok((id, outcome)) => {
                    running.remove(&id);
                    state.absorb(outcome, &mut queue, &mut seen);
                }
                Err(e) => match running.remove(&e.id()) {
                    Some((kind, url)) => state.fail_with(kind, url, format!("task failed: {}", e)),
                    None => warn!("Crawl task failed: {}", e),
                },
            }
        }

        let report = state.finish(categories);
        info!(
            "Crawl finished: {} categories, {} product links, {} products, {} details, {} companies, {} manufacturers, {} failures",
            report.categories.len(),
            report.product_links.len(),
            report.products.len(),
            report.details.len(),
            report.companies.len(),
            report.manufacturers.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn process(&self, job: Job) -> Outcome {
        match job {
            Job::Category(category) => {
                let result = self.traverse_category(&category).await;
                Outcome::Category { category, result }
            }
            Job::Product(link) => {
                let result = self.traverse_product(&link).await;
                Outcome::Product { link, result }
            }
            Job::Listing { link, url } => {
                let result = self.traverse_listing_page(&link, &url).await;
                Outcome::Listing { url, result }
            }
            Job::Detail { tile, url } => {
                let result = self.traverse_detail(&tile, &url).await;
                Outcome::Detail { url, result }
            }
        }
    }
}

/// Accumulated results, owned by the driver loop.
#[derive(Default)]
struct RunState {
    completed_categories: HashSet<String>,
    product_links: Vec<ProductLink>,
    products: Vec<ProductTile>,
    details: Vec<ProductDetail>,
    registry: EntityRegistry,
    failures: Vec<Failure>,
}

impl RunState {
    fn absorb(&mut self, outcome: Outcome, queue: &mut VecDeque<Job>, seen: &mut HashSet<String>) {
        match outcome {
            Outcome::Category { category, result: Ok(links) } => {
                debug!("Category '{}': {} product links", category.name, links.len());
                for link in links {
                    if seen.insert(link.url.clone()) {
                        queue.push_back(Job::Product(link));
                    }
                }
                self.completed_categories.insert(category.url);
            }
            Outcome::Category { category, result: Err(e) } => {
                self.fail(BranchKind::Category, category.url, e);
            }
            Outcome::Product { link, result: Ok(page) } => {
                if page.company_count > 0 {
                    let added = self.registry.add_companies(&page.company_names, &link.url);
                    debug!("'{}': {} new companies", link.name, added);
                } else {
                    debug!("'{}' lists no companies", link.name);
                }
                self.registry.add_manufacturers(&page.manufacturer_names, &link);

                for url in page.pagination {
                    if seen.insert(url.clone()) {
                        queue.push_back(Job::Listing { link: link.clone(), url });
                    }
                }
                self.add_tiles(page.tiles, queue, seen);
                self.product_links.push(link);
            }
            Outcome::Product { link, result: Err(e) } => {
                self.fail(BranchKind::Product, link.url, e);
            }
            Outcome::Listing { result: Ok(tiles), .. } => {
                self.add_tiles(tiles, queue, seen);
            }
            Outcome::Listing { url, result: Err(e) } => {
                self.fail(BranchKind::Listing, url, e);
            }
            Outcome::Detail { result: Ok(detail), .. } => {
                self.details.push(detail);
            }
            Outcome::Detail { url, result: Err(e) } => {
                self.fail(BranchKind::Detail, url, e);
            }
        }
    }

    /// Keeps `tiles` and queues each unseen detail page.
    fn add_tiles(
        &mut self,
        tiles: Vec<ProductTile>,
        queue: &mut VecDeque<Job>,
        seen: &mut HashSet<String>,
    ) {
        for tile in &tiles {
            if let Some(url) = &tile.url {
                if seen.insert(url.clone()) {
                    queue.push_back(Job::Detail { tile: tile.clone(), url: url.clone() });
                }
            }
        }
        self.products.extend(tiles);
    }

    fn fail(&mut self, kind: BranchKind, url: String, err: TraversalError) {
        self.fail_with(kind, url, err.to_string());
    }

    fn fail_with(&mut self, kind: BranchKind, url: String, reason: String) {
        warn!("Skipping {} branch {}: {}", kind, url, reason);
        self.failures.push(Failure { kind, url, reason });
    }

    /// Builds the report. A category listed in several menu sections is kept once.
    fn finish(self, categories: Vec<Category>) -> CrawlReport {
        let (companies, manufacturers) = self.registry.into_parts();
        let completed = self.completed_categories;
        let mut kept = HashSet::new();
        CrawlReport {
            categories: categories
                .into_iter()
                .filter(|c| completed.contains(&c.url) && kept.insert(c.url.clone()))
                .collect(),
            product_links: self.product_links,
            products: self.products,
            details: self.details,
            companies,
            manufacturers,
            failures: self.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expo::error::FetchError;
    use crate::expo::selectors::SelectorMap;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use url::Url;

    const BASE: &str = "https://www.medicalexpo.com/";

    enum Page {
        Html(String),
        Timeout,
    }

    /// Serves canned pages and counts requests per URL.
    #[derive(Default)]
    struct MockFetcher {
        pages: HashMap<String, Page>,
        calls: Mutex<HashMap<String, u32>>,
    }

    impl MockFetcher {
        fn page(mut self, url: &str, html: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), Page::Html(html.into()));
            self
        }

        fn timeout(mut self, url: &str) -> Self {
            self.pages.insert(url.to_string(), Page::Timeout);
            self
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
            match self.pages.get(url) {
                Some(Page::Html(html)) => Ok(html.clone()),
                Some(Page::Timeout) => Err(FetchError::Timeout { url: url.to_string() }),
                None => Err(FetchError::Status { url: url.to_string(), status: 404 }),
            }
        }
    }

    /// Delays every fetch and records the most requests seen in flight at once.
    #[derive(Default)]
    struct GatedFetcher {
        inner: MockFetcher,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for GatedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let result = self.inner.fetch(url).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    /// Panics when asked for one URL.
    struct PanickingFetcher {
        inner: MockFetcher,
        panic_on: String,
    }

    #[async_trait]
    impl PageFetcher for PanickingFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            if url == self.panic_on {
                panic!("fetcher blew up on {}", url);
            }
            self.inner.fetch(url).await
        }
    }

    fn crawler_with<T: PageFetcher + 'static>(fetcher: T, concurrency: usize) -> Crawler<T> {
        let parser = Parser::new(Url::parse(BASE).unwrap(), SelectorMap::default());
        let settings = CrawlSettings {
            concurrency,
            retry: RetryPolicy::immediate(3),
            max_categories: None,
        };
        Crawler::new(fetcher, parser, settings)
    }

    fn crawler(fetcher: MockFetcher) -> Crawler<MockFetcher> {
        crawler_with(fetcher, 3)
    }

    fn home(sections: &[(&str, Vec<(&str, &str)>)]) -> String {
        let mut html = String::from(r#"<html><body><div class="sc-6qd6g7-15">"#);
        for (label, links) in sections {
            html.push_str(r#"<div class="sc-ztyvp1-0"><li data-cy="universGroupItemCy_1">"#);
            html.push_str(&format!(r#"<span class="UniverseGroupLabel">{}</span><ul>"#, label));
            for (name, href) in links {
                html.push_str(&format!(r#"<li><a href="{}">{}</a></li>"#, href, name));
            }
            html.push_str("</ul></li></div>");
        }
        html.push_str("</div></body></html>");
        html
    }

    fn category_page(heading: &str, entries: &[(&str, &str)]) -> String {
        let mut html = format!(
            r#"<html><body><h1 id="category">{}</h1><ul class="category-grouplist">"#,
            heading
        );
        for (title, href) in entries {
            html.push_str(&format!(
                r#"<li><a href="{}"><p class="subCatTitle">{}</p></a></li>"#,
                href, title
            ));
        }
        html.push_str("</ul></body></html>");
        html
    }

    fn product_page(heading: &str, count: &str, companies: &[&str], manufacturers: &[&str]) -> String {
        let mut html = format!(
            r#"<html><body><h1 id="category">{}</h1><div id="sidebar"><span data-cy="companiesCount">{}</span><ul class="manufacturer-list">"#,
            heading, count
        );
        for c in companies {
            html.push_str(&format!("<li>{}</li>", c));
        }
        html.push_str("</ul>");
        for m in manufacturers {
            html.push_str(&format!(r#"<input type="checkbox" name="manufacturer" value="{}">"#, m));
        }
        html.push_str("</div></body></html>");
        html
    }

    #[tokio::test]
    async fn test_home_collects_every_section() {
        let first: Vec<(String, String)> =
            (1..=7).map(|i| (format!("Alpha {}", i), format!("/cat/alpha-{}.html", i))).collect();
        let second: Vec<(String, String)> =
            (1..=7).map(|i| (format!("Beta {}", i), format!("/cat/beta-{}.html", i))).collect();
        let a: Vec<(&str, &str)> = first.iter().map(|(n, h)| (n.as_str(), h.as_str())).collect();
        let b: Vec<(&str, &str)> = second.iter().map(|(n, h)| (n.as_str(), h.as_str())).collect();

        let fetcher = MockFetcher::default().page(BASE, home(&[("Surgery", a), ("Imaging", b)]));
        let categories = crawler(fetcher).traverse_home().await.unwrap();

        assert_eq!(categories.len(), 14);
        assert!(categories.iter().all(|c| c.url.starts_with("https://www.medicalexpo.com/cat/")));
        assert_eq!(categories[0].section, "Surgery");
        assert_eq!(categories[13].section, "Imaging");
    }

    #[tokio::test]
    async fn test_home_two_columns_of_seven_items() {
        let mut html = String::from(r#"<html><body><div class="sc-6qd6g7-15">"#);
        for column in 0..2 {
            html.push_str(r#"<div class="sc-ztyvp1-0">"#);
            for item in 0..7 {
                html.push_str(&format!(
                    r#"<li data-cy="universGroupItemCy_{item}"><span class="UniverseGroupLabel">Group {column}-{item}</span><ul><li><a href="/cat/c{column}-{item}.html">Sub {column}-{item}</a></li></ul></li>"#
                ));
            }
            html.push_str("</div>");
        }
        html.push_str("</div></body></html>");

        let categories =
            crawler(MockFetcher::default().page(BASE, html)).traverse_home().await.unwrap();

        assert_eq!(categories.len(), 14);
        assert_eq!(categories[0].section, "Group 0-0");
        assert_eq!(categories[7].name, "Sub 1-0");
        assert_eq!(categories[13].url, "https://www.medicalexpo.com/cat/c1-6.html");
    }

    #[tokio::test]
    async fn test_category_in_two_sections_is_reported_once() {
        let fetcher = MockFetcher::default()
            .page(
                BASE,
                home(&[
                    ("Surgery", vec![("Lasers", "/cat/lasers.html")]),
                    ("Aesthetics", vec![("Lasers", "/cat/lasers.html")]),
                ]),
            )
            .page("https://www.medicalexpo.com/cat/lasers.html", category_page("Lasers", &[]));

        let crawler = crawler(fetcher);
        let report = crawler.run().await.unwrap();

        assert_eq!(report.categories.len(), 1);
        assert_eq!(report.categories[0].section, "Surgery");
        assert_eq!(
            crawler.fetcher.calls.lock().unwrap()["https://www.medicalexpo.com/cat/lasers.html"],
            1
        );
    }

    #[tokio::test]
    async fn test_empty_category_yields_no_links() {
        let fetcher = MockFetcher::default()
            .page(BASE, home(&[("Surgery", vec![("Pumps", "/cat/pumps.html")])]))
            .page("https://www.medicalexpo.com/cat/pumps.html", category_page("Pumps", &[]));

        let report = crawler(fetcher).run().await.unwrap();
        assert_eq!(report.categories.len(), 1);
        assert!(report.product_links.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_heading_mismatch_skips_only_that_branch() {
        let fetcher = MockFetcher::default()
            .page(
                BASE,
                home(&[(
                    "Hospital",
                    vec![("Pumps & Valves", "/cat/pumps-valves.html"), ("Beds", "/cat/beds.html")],
                )]),
            )
            .page("https://www.medicalexpo.com/cat/pumps-valves.html", category_page("Pumps", &[]))
            .page(
                "https://www.medicalexpo.com/cat/beds.html",
                category_page("Beds", &[("Hospital bed", "/prod/hospital-bed.html")]),
            )
            .page(
                "https://www.medicalexpo.com/prod/hospital-bed.html",
                product_page("Hospital bed", "2 companies", &["Stryker", "Linet"], &["Stryker"]),
            );

        let report = crawler(fetcher).run().await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, BranchKind::Category);
        assert!(report.failures[0].reason.contains("consistency error"));

        assert_eq!(report.categories.len(), 1);
        assert_eq!(report.categories[0].name, "Beds");
        assert_eq!(report.product_links.len(), 1);
        assert_eq!(report.companies.len(), 2);
        assert_eq!(report.manufacturers.len(), 1);
        assert_eq!(report.manufacturers[0].category, "Beds");
    }

    #[tokio::test]
    async fn test_zero_company_count_creates_no_companies() {
        let fetcher = MockFetcher::default()
            .page(BASE, home(&[("Lab", vec![("Centrifuges", "/cat/centrifuges.html")])]))
            .page(
                "https://www.medicalexpo.com/cat/centrifuges.html",
                category_page("Centrifuges", &[("Benchtop", "/prod/benchtop.html")]),
            )
            .page(
                "https://www.medicalexpo.com/prod/benchtop.html",
                product_page("Benchtop", "0", &["Ghost Co"], &[]),
            );

        let report = crawler(fetcher).run().await.unwrap();
        assert!(report.companies.is_empty());
        assert_eq!(report.product_links.len(), 1);
    }

    #[tokio::test]
    async fn test_timeouts_fail_branch_after_three_attempts() {
        let slow = "https://www.medicalexpo.com/prod/slow.html";
        let fetcher = MockFetcher::default()
            .page(BASE, home(&[("Lab", vec![("Scales", "/cat/scales.html")])]))
            .page(
                "https://www.medicalexpo.com/cat/scales.html",
                category_page(
                    "Scales",
                    &[("Baby scale", "/prod/slow.html"), ("Floor scale", "/prod/floor.html")],
                ),
            )
            .timeout(slow)
            .page(
                "https://www.medicalexpo.com/prod/floor.html",
                product_page("Floor scale", "1", &["Seca"], &["Seca"]),
            );

        let crawler = crawler(fetcher);
        let report = crawler.run().await.unwrap();

        assert_eq!(crawler.fetcher.calls.lock().unwrap()[slow], 3);
        assert!(report.is_partial());
        assert_eq!(report.failures[0].url, slow);
        assert_eq!(report.failures[0].kind, BranchKind::Product);
        assert!(report.product_links.iter().all(|l| l.url != slow));
        assert_eq!(report.companies.len(), 1);
        assert_eq!(report.companies[0].name, "Seca");
    }

    #[tokio::test]
    async fn test_navigation_error_on_home_fails_run() {
        let fetcher = MockFetcher::default().page(BASE, "<html><body>redesigned</body></html>");
        let err = crawler(fetcher).run().await.unwrap_err();
        assert!(matches!(err, TraversalError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_pagination_is_followed_and_links_are_absolute() {
        let listing = "https://www.medicalexpo.com/prod/monitors-2.html";
        let mut first = product_page("Monitors", "1", &["Mindray"], &[]);
        first = first.replace(
            "</body>",
            r#"<div class="product-tile"><a href="/p/m1.html"><h3 class="short-name">M1</h3></a></div>
               <div class="pagination-wrapper"><a href="monitors-2.html">2</a></div></body>"#,
        );
        let second = r#"<html><body><div class="product-tile"><a href="/p/m2.html"><h3 class="short-name">M2</h3></a></div></body></html>"#;

        let fetcher = MockFetcher::default()
            .page(BASE, home(&[("ICU", vec![("Monitoring", "/cat/monitoring.html")])]))
            .page(
                "https://www.medicalexpo.com/cat/monitoring.html",
                category_page("Monitoring", &[("Monitors", "/prod/monitors.html")]),
            )
            .page("https://www.medicalexpo.com/prod/monitors.html", first)
            .page(listing, second)
            .page("https://www.medicalexpo.com/p/m1.html", "<html><body></body></html>")
            .page("https://www.medicalexpo.com/p/m2.html", "<html><body></body></html>");

        let report = crawler(fetcher).run().await.unwrap();

        let mut titles: Vec<&str> = report.products.iter().map(|p| p.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["M1", "M2"]);
        assert_eq!(report.details.len(), 2);
        assert!(report.failures.is_empty());

        let urls = report
            .categories
            .iter()
            .map(|c| c.url.as_str())
            .chain(report.product_links.iter().map(|l| l.url.as_str()))
            .chain(report.products.iter().filter_map(|p| p.url.as_deref()));
        for url in urls {
            assert!(Url::parse(url).is_ok(), "not absolute: {}", url);
        }
    }

    #[tokio::test]
    async fn test_detail_pages_are_fetched_once_per_tile() {
        let detail = r#"<html><body>
            <span class="sc-2mcr2-0"><span>Infusion pump</span><span>IP-7</span></span>
            <dl class="sc-mgb5nu-0"><dt>Type</dt><dd>volumetric</dd></dl>
            <div class="supplierDetails__Name-x">Acme</div>
            </body></html>"#;
        let tiles = r#"<div class="product-tile"><a href="/p/ip7.html"><h3 class="short-name">IP-7</h3></a></div>
            <div class="product-tile"><a href="/p/gone.html"><h3 class="short-name">Gone</h3></a></div>"#;
        let first = product_page("Pumps", "1", &["Acme"], &[]).replace(
            "</body>",
            &format!(r#"{}<div class="pagination-wrapper"><a href="pumps-2.html">2</a></div></body>"#, tiles),
        );
        // the second page lists the first tile again
        let second = format!("<html><body>{}</body></html>", &tiles[..tiles.find("</div>").unwrap() + 6]);

        let fetcher = MockFetcher::default()
            .page(BASE, home(&[("ICU", vec![("Infusion", "/cat/infusion.html")])]))
            .page(
                "https://www.medicalexpo.com/cat/infusion.html",
                category_page("Infusion", &[("Pumps", "/prod/pumps.html")]),
            )
            .page("https://www.medicalexpo.com/prod/pumps.html", first)
            .page("https://www.medicalexpo.com/prod/pumps-2.html", second)
            .page("https://www.medicalexpo.com/p/ip7.html", detail);

        let crawler = crawler(fetcher);
        let report = crawler.run().await.unwrap();

        assert_eq!(report.products.len(), 3);
        assert_eq!(report.details.len(), 1);
        let detail = &report.details[0];
        assert_eq!(detail.title, "Infusion pump");
        assert_eq!(detail.model.as_deref(), Some("IP-7"));
        assert_eq!(detail.product, "Pumps");
        assert_eq!(detail.supplier.as_deref(), Some("Acme"));
        assert_eq!(detail.characteristics[0].value, "volumetric");

        assert_eq!(crawler.fetcher.calls.lock().unwrap()["https://www.medicalexpo.com/p/ip7.html"], 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, BranchKind::Detail);
        assert_eq!(report.failures[0].url, "https://www.medicalexpo.com/p/gone.html");
    }

    #[tokio::test]
    async fn test_concurrency_bounds_requests_in_flight() {
        let entries: Vec<(String, String)> =
            (1..=8).map(|i| (format!("Pump {}", i), format!("/prod/pump-{}.html", i))).collect();
        let refs: Vec<(&str, &str)> = entries.iter().map(|(n, h)| (n.as_str(), h.as_str())).collect();

        let mut inner = MockFetcher::default()
            .page(BASE, home(&[("ICU", vec![("Pumps", "/cat/pumps.html")])]))
            .page("https://www.medicalexpo.com/cat/pumps.html", category_page("Pumps", &refs));
        for (name, href) in &entries {
            inner = inner.page(
                &format!("https://www.medicalexpo.com{}", href),
                product_page(name, "0", &[], &[]),
            );
        }

        let crawler = crawler_with(GatedFetcher { inner, ..GatedFetcher::default() }, 2);
        let report = crawler.run().await.unwrap();

        assert_eq!(report.product_links.len(), 8);
        assert!(report.failures.is_empty());
        assert_eq!(crawler.fetcher.peak.load(Ordering::SeqCst), 2);
        assert_eq!(crawler.fetcher.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicked_branch_is_recorded_as_failure() {
        let broken = "https://www.medicalexpo.com/prod/broken.html";
        let inner = MockFetcher::default()
            .page(BASE, home(&[("Lab", vec![("Scales", "/cat/scales.html")])]))
            .page(
                "https://www.medicalexpo.com/cat/scales.html",
                category_page(
                    "Scales",
                    &[("Broken scale", "/prod/broken.html"), ("Floor scale", "/prod/floor.html")],
                ),
            )
            .page(
                "https://www.medicalexpo.com/prod/floor.html",
                product_page("Floor scale", "1", &["Seca"], &[]),
            );

        let fetcher = PanickingFetcher { inner, panic_on: broken.to_string() };
        let report = crawler_with(fetcher, 2).run().await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, BranchKind::Product);
        assert_eq!(report.failures[0].url, broken);
        assert!(report.failures[0].reason.contains("task failed"));
        assert_eq!(report.product_links.len(), 1);
        assert_eq!(report.companies[0].name, "Seca");
    }

    #[tokio::test]
    async fn test_max_categories_limits_run() {
        let fetcher = MockFetcher::default()
            .page(
                BASE,
                home(&[("Lab", vec![("Scales", "/cat/scales.html"), ("Pipettes", "/cat/pipettes.html")])]),
            )
            .page("https://www.medicalexpo.com/cat/scales.html", category_page("Scales", &[]));

        let mut crawler = crawler(fetcher);
        crawler.settings.max_categories = Some(1);
        let report = crawler.run().await.unwrap();

        assert_eq!(report.categories.len(), 1);
        assert!(report.failures.is_empty());
    }
}
