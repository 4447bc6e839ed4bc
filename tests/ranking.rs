use laliga_scout::collector::PlayerSource;
use laliga_scout::fake_feed::SyntheticSource;
use laliga_scout::market_value::{market_value_millions, parse_market_value, rank_players};
use laliga_scout::state::PlayerRecord;

fn player(id: &str, value: &str) -> PlayerRecord {
    PlayerRecord {
        id: id.to_string(),
        name: format!("Player {id}"),
        position: "Centre-Forward".to_string(),
        nationality: "Spain".to_string(),
        club: "Test CF".to_string(),
        league: None,
        market_value: value.to_string(),
        percentile: 0,
    }
}

fn percentile_of(players: &[PlayerRecord], id: &str) -> u8 {
    players.iter().find(|p| p.id == id).unwrap().percentile
}

#[test]
fn documented_value_examples() {
    assert!((parse_market_value("€1,50m").unwrap() - 1.5).abs() < 1e-9);
    assert!((parse_market_value("€500k").unwrap() - 0.5).abs() < 1e-9);
}

#[test]
fn hundred_million_outranks_nine_hundred_thousand() {
    let ranked = rank_players(vec![player("a", "€900k"), player("b", "€100m")]);
    assert!(percentile_of(&ranked, "b") > percentile_of(&ranked, "a"));
    assert_eq!(percentile_of(&ranked, "b"), 100);
    assert_eq!(percentile_of(&ranked, "a"), 50);
}

#[test]
fn single_player_gets_full_percentile() {
    let ranked = rank_players(vec![player("solo", "€3,00m")]);
    assert_eq!(ranked[0].percentile, 100);
}

#[test]
fn tied_maximums_all_reach_hundred() {
    let ranked = rank_players(vec![
        player("a", "€50,00m"),
        player("b", "€50m"),
        player("c", "€10m"),
    ]);
    assert_eq!(percentile_of(&ranked, "a"), 100);
    assert_eq!(percentile_of(&ranked, "b"), 100);
    assert_eq!(percentile_of(&ranked, "c"), 33);
}

#[test]
fn unparseable_values_rank_as_zero() {
    assert_eq!(market_value_millions("-"), 0.0);
    assert_eq!(market_value_millions("€0"), 0.0);
    assert_eq!(market_value_millions("€12000000"), 0.0);

    let ranked = rank_players(vec![
        player("bad", "n/a"),
        player("zero", "€0"),
        player("ok", "€200k"),
    ]);
    assert_eq!(percentile_of(&ranked, "bad"), 67);
    assert_eq!(percentile_of(&ranked, "zero"), 67);
    assert_eq!(percentile_of(&ranked, "ok"), 100);
}

#[test]
fn ranking_keeps_display_values_and_order() {
    let input = vec![player("x", "€1,50m"), player("y", "€750k")];
    let ranked = rank_players(input.clone());
    assert_eq!(ranked.len(), 2);
    for (before, after) in input.iter().zip(&ranked) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.market_value, after.market_value);
    }
}

#[test]
fn synthetic_population_ranks_within_bounds() {
    let players = SyntheticSource::new(Some(7), 20).collect();
    assert_eq!(players.len(), 20 * 20);

    let ranked = rank_players(players);
    assert!(ranked.iter().all(|p| p.percentile <= 100));

    let max_value = ranked
        .iter()
        .map(|p| market_value_millions(&p.market_value))
        .fold(f64::MIN, f64::max);
    for p in &ranked {
        if market_value_millions(&p.market_value) == max_value {
            assert_eq!(p.percentile, 100);
        }
    }
}

#[test]
fn synthetic_source_is_deterministic_with_seed_and_well_formed() {
    let a = SyntheticSource::new(Some(42), 10).collect();
    let b = SyntheticSource::new(Some(42), 10).collect();
    assert_eq!(a, b);

    let mut ids = a.iter().map(|p| p.id.clone()).collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), a.len());

    for p in &a {
        assert!(p.market_value.starts_with('€'));
        assert!(
            parse_market_value(&p.market_value).is_ok(),
            "bad value {}",
            p.market_value
        );
        assert!(p.market_value.ends_with('m') || p.market_value.ends_with('k'));
    }
}
