use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow};

use laliga_scout::collector::{PageFetcher, PlayerSource, TransfermarktSource};
use laliga_scout::config::Config;

const BASE: &str = "https://tm.test";
const LEAGUE_URL: &str = "https://tm.test/laliga/startseite/wettbewerb/ES1";
const REAL_MADRID_URL: &str = "https://tm.test/real-madrid/startseite/verein/418/saison_id/2024";
const BARCELONA_URL: &str = "https://tm.test/fc-barcelona/startseite/verein/131/saison_id/2024";

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

/// Serves canned pages; any other url fails like an http error.
#[derive(Default)]
struct CannedPages {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl CannedPages {
    fn with(mut self, url: &str, body: String) -> Self {
        self.pages.insert(url.to_string(), body);
        self
    }

    fn requested(&self) -> Vec<String> {
        let mut urls = self.requested.lock().unwrap().clone();
        urls.sort();
        urls
    }
}

impl PageFetcher for CannedPages {
    fn fetch(&self, url: &str) -> Result<String> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("http 500 Internal Server Error for {url}"))
    }
}

fn config() -> Config {
    Config {
        base_url: BASE.to_string(),
        league_url: LEAGUE_URL.to_string(),
        delay_min: Duration::ZERO,
        delay_max: Duration::ZERO,
        fetch_parallelism: 2,
        ..Config::default()
    }
}

#[test]
fn failing_club_is_isolated_from_the_rest() {
    let pages = CannedPages::default()
        .with(LEAGUE_URL, read_fixture("league_page.html"))
        .with(REAL_MADRID_URL, read_fixture("club_page.html"));
    let source = TransfermarktSource::with_fetcher(&config(), pages);

    let players = source.collect();
    assert_eq!(players.len(), 4);
    assert!(players.iter().all(|p| p.club == "Atlético de Madrid"));
    assert!(players.iter().all(|p| p.league.as_deref() == Some("LaLiga")));
}

#[test]
fn club_page_without_roster_contributes_nothing() {
    let pages = CannedPages::default()
        .with(LEAGUE_URL, read_fixture("league_page.html"))
        .with(REAL_MADRID_URL, "<html><h1 class=\"data-header__headline-wrapper\">Real Madrid</h1></html>".to_string())
        .with(BARCELONA_URL, read_fixture("club_page.html"));
    let source = TransfermarktSource::with_fetcher(&config(), pages);

    let players = source.collect();
    assert_eq!(players.len(), 4);
    assert_eq!(players[0].id, "121483");
}

#[test]
fn players_listed_by_two_clubs_are_kept_once() {
    let club = read_fixture("club_page.html");
    let pages = CannedPages::default()
        .with(LEAGUE_URL, read_fixture("league_page.html"))
        .with(REAL_MADRID_URL, club.clone())
        .with(BARCELONA_URL, club);
    let source = TransfermarktSource::with_fetcher(&config(), pages);

    let players = source.collect();
    assert_eq!(players.len(), 4);
}

#[test]
fn club_requests_follow_the_league_listing() {
    let pages = CannedPages::default().with(LEAGUE_URL, read_fixture("league_page.html"));
    let source = TransfermarktSource::with_fetcher(&config(), CannedPagesRef(&pages));

    assert!(source.collect().is_empty());
    assert_eq!(
        pages.requested(),
        vec![BARCELONA_URL.to_string(), LEAGUE_URL.to_string(), REAL_MADRID_URL.to_string()]
    );
}

#[test]
fn unreachable_league_page_yields_empty() {
    let source = TransfermarktSource::with_fetcher(&config(), CannedPages::default());
    assert!(source.collect().is_empty());
}

#[test]
fn league_page_without_listing_yields_empty() {
    let pages = CannedPages::default()
        .with(LEAGUE_URL, "<html><body><p>Access denied</p></body></html>".to_string())
        .with(REAL_MADRID_URL, read_fixture("club_page.html"));
    let source = TransfermarktSource::with_fetcher(&config(), CannedPagesRef(&pages));

    assert!(source.collect().is_empty());
    assert_eq!(pages.requested(), vec![LEAGUE_URL.to_string()]);
}

struct CannedPagesRef<'a>(&'a CannedPages);

impl PageFetcher for CannedPagesRef<'_> {
    fn fetch(&self, url: &str) -> Result<String> {
        self.0.fetch(url)
    }
}
