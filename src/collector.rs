use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use rand::Rng;
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::html::{self, Element};
use crate::http_client::{fetch_text, http_client};
use crate::state::PlayerRecord;

const CLUB_LINK_MARKER: &str = "/startseite/verein/";
const PLAYER_LINK_MARKER: &str = "/spieler/";
const UNKNOWN: &str = "Unknown";
const UNKNOWN_TEAM: &str = "Unknown Team";
const MISSING_VALUE: &str = "€0";

/// Anything that can produce a fresh, unranked player population.
///
/// Implementations never fail outright: on an unrecoverable problem they
/// log it and return an empty list, and the caller decides what to serve.
pub trait PlayerSource: Send + Sync {
    fn name(&self) -> &str;
    fn collect(&self) -> Vec<PlayerRecord>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClubPage {
    pub name: String,
    pub players: Vec<PlayerRecord>,
}

/// Page transport underneath [`TransfermarktSource`].
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP through the shared client.
#[derive(Debug, Clone, Copy)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let client = http_client(self.timeout)?;
        fetch_text(client, url)
    }
}

/// Scrapes a league overview and then every club squad page it links to.
pub struct TransfermarktSource<F: PageFetcher = HttpFetcher> {
    fetcher: F,
    base_url: String,
    league_url: String,
    league_name: Option<String>,
    delay_min: Duration,
    delay_max: Duration,
    parallelism: usize,
}

impl TransfermarktSource<HttpFetcher> {
    pub fn from_config(config: &Config) -> Self {
        Self::with_fetcher(config, HttpFetcher::new(config.request_timeout))
    }
}

impl<F: PageFetcher> TransfermarktSource<F> {
    pub fn with_fetcher(config: &Config, fetcher: F) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.clone(),
            league_url: config.league_url.clone(),
            league_name: Some(config.league_name.clone()).filter(|n| !n.is_empty()),
            delay_min: config.delay_min,
            delay_max: config.delay_max.max(config.delay_min),
            parallelism: config.fetch_parallelism.max(1),
        }
    }

    fn collect_inner(&self) -> Result<Vec<PlayerRecord>> {
        let league_html = self
            .fetcher
            .fetch(&self.league_url)
            .context("league page request failed")?;
        let club_links = parse_club_links(&league_html, &self.base_url);
        if club_links.is_empty() {
            return Err(anyhow!("no club links found, page structure may have changed"));
        }
        info!(clubs = club_links.len(), "found clubs");

        let per_club: Vec<Vec<PlayerRecord>> = with_fetch_pool(self.parallelism, || {
            club_links
                .par_iter()
                .map(|url| self.collect_club(url))
                .collect()
        });

        let mut players = Vec::new();
        let mut seen = HashSet::new();
        for club_players in per_club {
            for player in club_players {
                if seen.insert(player.id.clone()) {
                    players.push(player);
                }
            }
        }
        Ok(players)
    }

    /// A failing club contributes no rows; the rest of the pass continues.
    fn collect_club(&self, url: &str) -> Vec<PlayerRecord> {
        thread::sleep(self.courtesy_delay());
        let result = self.fetcher.fetch(url).and_then(|body| parse_club_page(&body));
        match result {
            Ok(mut page) => {
                info!(club = %page.name, players = page.players.len(), "scraped club");
                for player in &mut page.players {
                    player.league = self.league_name.clone();
                }
                page.players
            }
            Err(err) => {
                warn!(url, "club scrape failed: {err:#}");
                Vec::new()
            }
        }
    }

    fn courtesy_delay(&self) -> Duration {
        if self.delay_max <= self.delay_min {
            return self.delay_min;
        }
        let min = self.delay_min.as_millis() as u64;
        let max = self.delay_max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl<F: PageFetcher> PlayerSource for TransfermarktSource<F> {
    fn name(&self) -> &str {
        "transfermarkt"
    }

    fn collect(&self) -> Vec<PlayerRecord> {
        info!(url = %self.league_url, "starting live collection");
        match self.collect_inner() {
            Ok(players) => {
                info!(players = players.len(), "live collection finished");
                players
            }
            Err(err) => {
                error!("live collection failed: {err:#}");
                Vec::new()
            }
        }
    }
}

/// Absolute club squad URLs from a league overview page, in page order.
pub fn parse_club_links(league_html: &str, base_url: &str) -> Vec<String> {
    let Some(table) = html::find_first_with_class(league_html, "table", "items") else {
        return Vec::new();
    };
    let base = base_url.trim_end_matches('/');
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for row in listing_rows(&table) {
        let Some(href) = row
            .find_first_with_class("td", "hauptlink")
            .and_then(|cell| cell.find_all("a").into_iter().next())
            .and_then(|a| a.attr("href"))
        else {
            continue;
        };
        if !href.contains(CLUB_LINK_MARKER) {
            continue;
        }
        let url = if href.starts_with("http") {
            href
        } else {
            format!("{base}{href}")
        };
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }
    links
}

pub fn parse_club_page(club_html: &str) -> Result<ClubPage> {
    let name = html::find_first_with_class(club_html, "h1", "data-header__headline-wrapper")
        .map(|h| h.text())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TEAM.to_string());

    let table = html::find_first_with_class(club_html, "table", "items")
        .ok_or_else(|| anyhow!("no players table found for {name}"))?;

    let players = listing_rows(&table)
        .iter()
        .filter_map(|row| parse_player_row(row, &name))
        .collect();

    Ok(ClubPage { name, players })
}

fn listing_rows<'a>(table: &Element<'a>) -> Vec<Element<'a>> {
    html::find_with_any_class(table.inner, "tr", &["odd", "even"])
}

fn parse_player_row(row: &Element<'_>, club: &str) -> Option<PlayerRecord> {
    let link = row
        .find_first_with_class("td", "hauptlink")
        .and_then(|cell| cell.find_all("a").into_iter().next())?;
    let name = link.text();
    let id = link.attr("href").as_deref().and_then(player_id_from_href)?;
    if name.is_empty() {
        return None;
    }

    let position = row
        .find_first_with_class("td", "posrela")
        .map(|cell| position_from_cell(&cell))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let nationality = html::find_open_tags(row.inner, "img")
        .into_iter()
        .filter(|attrs| html::class_list_contains(attrs, "flaggenrahmen"))
        .find_map(|attrs| html::attr_value(attrs, "title"))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let market_value = row
        .find_first_with_class("td", "rechts")
        .map(|cell| cell.text())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| MISSING_VALUE.to_string());

    Some(PlayerRecord {
        id,
        name,
        position,
        nationality,
        club: club.to_string(),
        league: None,
        market_value,
        percentile: 0,
    })
}

/// The position cell wraps an inline table whose last row holds the role.
fn position_from_cell(cell: &Element<'_>) -> String {
    let rows = cell.find_all("tr");
    match rows.last() {
        Some(last) if rows.len() > 1 => last.text(),
        _ => cell.text(),
    }
}

fn player_id_from_href(href: &str) -> Option<String> {
    let idx = href.find(PLAYER_LINK_MARKER)?;
    let digits: String = href[idx + PLAYER_LINK_MARKER.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    (!digits.is_empty()).then_some(digits)
}

fn with_fetch_pool<T>(threads: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}

#[cfg(test)]
mod tests {
    use super::player_id_from_href;

    #[test]
    fn player_id_from_profile_href() {
        assert_eq!(
            player_id_from_href("/jan-oblak/profil/spieler/121483").as_deref(),
            Some("121483")
        );
        assert_eq!(player_id_from_href("/jan-oblak/profil/spieler/"), None);
        assert_eq!(player_id_from_href("/atletico-madrid/startseite/verein/13"), None);
    }
}
