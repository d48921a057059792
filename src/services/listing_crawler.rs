//! Paginated crawl of a series' chapter-listing table, plus best-effort
//! series metadata scraping.
//!
//! The crawler is scoped to one listing-table format: rows of
//! `(group, chapter)` cells under `#myTable`, paginated by an `a.next_page`
//! link. A series lists releases from many translation groups; only the
//! first group seen forms a consistent chapter sequence, so every other
//! group is filtered out for the rest of the crawl.

use std::collections::HashSet;
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use super::sync::sync_chapter_positions;
use crate::config::Settings;
use crate::error::ScrapeError;
use crate::models::ChapterRef;
use crate::repository::Store;
use crate::scrapers::{BrowserSession, BrowserSessionConfig};

/// Cover-image selectors tried in priority order on the series page.
const IMAGE_SELECTORS: &[&str] = &[
    ".seriesimg img",
    ".series-img img",
    ".novelimg img",
    ".cover img",
    "img.series-image",
];

/// Attributes checked on the chosen image element, in priority order.
const IMAGE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-lazy-src"];

const DESCRIPTION_SELECTORS: &[&str] = &[
    "#editdescription p",
    ".description p",
    "#description p",
    ".seriesother p",
    ".summary p",
];

const TAG_SELECTORS: &[&str] = &["#seriesgenre a", ".genre a", "#showtags a", ".tags a"];

/// The translation group a crawl is locked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub name: String,
    pub link: Option<String>,
}

/// Best-effort series metadata; any field may be absent.
#[derive(Debug, Clone, Default)]
pub struct SeriesMetadata {
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

/// Result of one series crawl.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Novel the chapters were reconciled into; `None` when the listing
    /// was empty.
    pub novel_id: Option<i64>,
    /// Chapter refs collected from the listing (after group filtering).
    pub chapters_listed: usize,
}

/// One parsed listing page.
#[derive(Debug, Default)]
struct ParsedPage {
    refs: Vec<ChapterRef>,
    /// Newly locked group, set only while no group was locked yet.
    group: Option<GroupInfo>,
    next_href: Option<String>,
    rows: usize,
}

/// Crawls one series listing and reconciles the result into the store.
pub struct ListingCrawler {
    store: Arc<Mutex<Store>>,
    settings: Settings,
}

impl ListingCrawler {
    pub fn new(store: Arc<Mutex<Store>>, settings: Settings) -> Self {
        Self { store, settings }
    }

    /// Crawl a series page, discover/create its novel and chapters, and
    /// synchronize chapter positions. The browser session opened here is
    /// closed on every exit path.
    pub async fn crawl_series(&self, raw_url: &str) -> Result<CrawlSummary, ScrapeError> {
        let (series_url, slug) = self.validate_series_url(raw_url)?;
        let base = self.settings.source_base_url();
        let canonical_link = format!("{base}/series/{slug}/");

        let config = BrowserSessionConfig {
            headless: self.settings.fetch.headless,
            timeout: self.settings.browser_timeout(),
        };
        let session = BrowserSession::open(&config)
            .await
            .map_err(|e| ScrapeError::BrowserSession(e.to_string()))?;

        let crawl_result = self.collect(&session, series_url.as_str()).await;
        session.close().await;

        let (refs, group, metadata) =
            crawl_result.map_err(|e| ScrapeError::BrowserSession(e.to_string()))?;
        info!(chapters = refs.len(), url = raw_url, "listing crawl finished");

        if refs.is_empty() {
            return Ok(CrawlSummary {
                novel_id: None,
                chapters_listed: 0,
            });
        }
        let group = group.unwrap_or(GroupInfo {
            name: "Unknown".to_string(),
            link: None,
        });

        let store = self.store.lock().await;
        let website = store.find_or_create_website(group.link.as_deref(), &group.name)?;
        let novel =
            store.find_or_create_novel(website.id, &canonical_link, &novel_name_from_slug(&slug))?;
        let tags = if metadata.tags.is_empty() {
            None
        } else {
            Some(metadata.tags.as_slice())
        };
        store.update_novel_metadata(
            novel.id,
            metadata.description.as_deref(),
            metadata.image_url.as_deref(),
            tags,
        )?;

        if let Err(e) = sync_chapter_positions(&store, novel.id, &refs) {
            error!(novel_id = novel.id, error = %e, "chapter synchronization rolled back");
            return Err(ScrapeError::Synchronization(e));
        }

        Ok(CrawlSummary {
            novel_id: Some(novel.id),
            chapters_listed: refs.len(),
        })
    }

    /// Reject anything that is not `https://<source-host>/series/<slug>`
    /// before any network activity.
    fn validate_series_url(&self, raw: &str) -> Result<(Url, String), ScrapeError> {
        let invalid = || ScrapeError::InvalidSourceUrl(raw.to_string());
        let url = Url::parse(raw).map_err(|_| invalid())?;

        if url.scheme() != "https" {
            return Err(invalid());
        }
        if url.host_str() != Some(self.settings.source.host.as_str()) {
            return Err(invalid());
        }
        let slug = url
            .path()
            .strip_prefix("/series/")
            .and_then(|rest| rest.split('/').next())
            .filter(|slug| !slug.is_empty())
            .ok_or_else(invalid)?
            .to_string();

        Ok((url, slug))
    }

    /// Walk the paginated listing, then scrape the series page metadata.
    async fn collect(
        &self,
        session: &BrowserSession,
        series_url: &str,
    ) -> anyhow::Result<(Vec<ChapterRef>, Option<GroupInfo>, SeriesMetadata)> {
        let base = self.settings.source_base_url();

        self.login(session).await;

        session.navigate(series_url).await?;
        tokio::time::sleep(self.settings.page_delay()).await;

        let mut refs: Vec<ChapterRef> = Vec::new();
        let mut group: Option<GroupInfo> = None;
        let mut current_url = series_url.to_string();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(current_url.clone());

        loop {
            let html = session.current_html().await?;
            let page = parse_listing_page(&html, &base, group.as_ref());

            if group.is_none() {
                if let Some(locked) = &page.group {
                    info!(group = locked.name.as_str(), "target group locked");
                }
                group = page.group;
            }
            refs.extend(page.refs);

            // An empty row set is as terminal as a missing next link.
            if page.rows == 0 {
                debug!(url = current_url.as_str(), "no listing rows, stopping");
                break;
            }
            let Some(href) = page.next_href else { break };
            let Some(next_url) = resolve_next_url(&href, &current_url, &base) else {
                break;
            };
            if !visited.insert(next_url.clone()) {
                warn!(url = next_url.as_str(), "pagination loop detected, stopping");
                break;
            }

            session.navigate(&next_url).await?;
            current_url = next_url;
            tokio::time::sleep(self.settings.page_delay()).await;
        }

        // The series page itself (not the listing table) carries the
        // cover, description, and genres.
        session.navigate(series_url).await?;
        let html = session.current_html().await?;
        let metadata = parse_series_metadata(&html);

        self.resolve_redirect_links(session, &base, &mut refs).await;

        Ok((refs, group, metadata))
    }

    /// Best-effort login; absence of credentials or a failed login never
    /// aborts the crawl.
    async fn login(&self, session: &BrowserSession) {
        let (Some(username), Some(password)) = (
            self.settings.source.username.as_deref(),
            self.settings.source.password.as_deref(),
        ) else {
            debug!("no source credentials configured, skipping login");
            return;
        };

        let login_url = format!(
            "{}{}",
            self.settings.source_base_url(),
            self.settings.source.login_path
        );
        let attempt = async {
            session.navigate(&login_url).await?;
            session.type_into(r#"input[name="log"]"#, username).await?;
            session.type_into(r#"input[name="pwd"]"#, password).await?;
            session.click(r#"input[type="submit"]"#).await?;
            anyhow::Ok(())
        };
        match attempt.await {
            Ok(()) => {
                // Give the post-login redirect a moment to settle.
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                info!("logged in to source");
            }
            Err(e) => warn!(error = %e, "source login failed, continuing without a session"),
        }
    }

    /// Chapter links on the source host are redirects to the real chapter
    /// page; resolve each through a throwaway tab. Best-effort per link.
    async fn resolve_redirect_links(
        &self,
        session: &BrowserSession,
        base: &str,
        refs: &mut [ChapterRef],
    ) {
        let redirect_prefix = format!("{base}{}", self.settings.source.redirect_path_prefix);
        for chapter_ref in refs.iter_mut() {
            if !chapter_ref.url.starts_with(&redirect_prefix) {
                continue;
            }
            match session.resolve_redirect(&chapter_ref.url).await {
                Ok(resolved) if !resolved.is_empty() && resolved != chapter_ref.url => {
                    debug!(
                        from = chapter_ref.url.as_str(),
                        to = resolved.as_str(),
                        "resolved chapter redirect"
                    );
                    chapter_ref.url = resolved;
                }
                Ok(_) => {}
                Err(e) => debug!(url = chapter_ref.url.as_str(), error = %e, "redirect resolution failed"),
            }
        }
    }
}

/// Parse one listing page: extract refs for the locked group (locking it
/// from the first row when none is locked yet) and the next-page href.
fn parse_listing_page(html: &str, base: &str, target_group: Option<&GroupInfo>) -> ParsedPage {
    let doc = Html::parse_document(html);
    let row_selector = Selector::parse("#myTable tbody tr").unwrap();
    let cell_selector = Selector::parse("td").unwrap();
    let anchor_selector = Selector::parse("a").unwrap();
    let next_selector = Selector::parse("a.next_page").unwrap();

    let mut page = ParsedPage::default();
    let mut locked: Option<GroupInfo> = target_group.cloned();

    for row in doc.select(&row_selector) {
        page.rows += 1;

        let cells: Vec<ElementRef<'_>> = row.select(&cell_selector).collect();
        if cells.len() < 3 {
            continue;
        }

        let group_anchor = cells[1].select(&anchor_selector).next();
        let group_name = group_anchor
            .map(|a| a.text().collect::<String>().trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let group_link = group_anchor
            .and_then(|a| a.value().attr("href"))
            .map(|href| absolutize(href, base));

        // Lock the target group to the first row seen across the crawl.
        if locked.is_none() {
            let group = GroupInfo {
                name: group_name.clone(),
                link: group_link,
            };
            locked = Some(group.clone());
            page.group = Some(group);
        }
        if locked.as_ref().map(|g| g.name.as_str()) != Some(group_name.as_str()) {
            continue;
        }

        let Some(chapter_anchor) = cells[2].select(&anchor_selector).next() else {
            continue;
        };
        let title = chapter_anchor.text().collect::<String>().trim().to_string();
        let Some(href) = chapter_anchor.value().attr("href") else {
            continue;
        };

        page.refs.push(ChapterRef {
            group: group_name,
            title,
            url: absolutize(href, base),
        });
    }

    page.next_href = doc
        .select(&next_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);

    page
}

/// Resolve chapter/group hrefs: protocol-relative gets `https:`,
/// root-relative gets the source base, absolute passes through.
fn absolutize(href: &str, base: &str) -> String {
    if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        href.to_string()
    }
}

/// Resolve a next-page href against the page it appeared on. Supports
/// `./`-relative, root-relative, and absolute forms.
fn resolve_next_url(href: &str, current_url: &str, base: &str) -> Option<String> {
    if href.starts_with("./") {
        Url::parse(current_url)
            .ok()?
            .join(href)
            .ok()
            .map(|u| u.to_string())
    } else if !href.starts_with("http") {
        Some(format!("{base}{href}"))
    } else {
        Some(href.to_string())
    }
}

/// Derive a display name from a series slug: `my-novel` becomes `My Novel`.
fn novel_name_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scrape cover image, description, and genre tags from the series page.
/// Every field is independently optional.
fn parse_series_metadata(html: &str) -> SeriesMetadata {
    let doc = Html::parse_document(html);
    let mut metadata = SeriesMetadata::default();

    for selector_str in IMAGE_SELECTORS {
        let selector = Selector::parse(selector_str).unwrap();
        if let Some(img) = doc.select(&selector).next() {
            metadata.image_url = image_url_from(&img);
            if metadata.image_url.is_some() {
                break;
            }
        }
    }

    for selector_str in DESCRIPTION_SELECTORS {
        let selector = Selector::parse(selector_str).unwrap();
        let paragraphs: Vec<String> = doc
            .select(&selector)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            metadata.description = Some(paragraphs.join("\n\n"));
            break;
        }
    }

    for selector_str in TAG_SELECTORS {
        let selector = Selector::parse(selector_str).unwrap();
        let tags: Vec<String> = doc
            .select(&selector)
            .map(|a| a.text().collect::<String>().trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        if !tags.is_empty() {
            metadata.tags = tags;
            break;
        }
    }

    metadata
}

/// Pull an image URL out of an `img` element, checking direct attributes
/// first and `srcset`'s first candidate last.
fn image_url_from(img: &ElementRef<'_>) -> Option<String> {
    for attribute in IMAGE_ATTRIBUTES {
        if let Some(value) = img.value().attr(attribute) {
            let value = value.trim();
            if !value.is_empty() && !value.starts_with("data:") {
                return Some(value.to_string());
            }
        }
    }
    img.value().attr("srcset").and_then(|srcset| {
        srcset
            .split(',')
            .next()?
            .split_whitespace()
            .next()
            .map(str::to_string)
    })
}
