use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::collector::PlayerSource;
use crate::config::Config;
use crate::state::PlayerRecord;

const LALIGA_CLUBS: &[&str] = &[
    "Real Madrid",
    "FC Barcelona",
    "Atlético de Madrid",
    "Athletic Bilbao",
    "Villarreal CF",
    "Real Sociedad",
    "Real Betis Balompié",
    "Girona FC",
    "Sevilla FC",
    "Valencia CF",
    "CA Osasuna",
    "Celta de Vigo",
    "RCD Mallorca",
    "Rayo Vallecano",
    "Getafe CF",
    "Deportivo Alavés",
    "UD Las Palmas",
    "RCD Espanyol Barcelona",
    "CD Leganés",
    "Real Valladolid CF",
];

/// Position name and how many of a squad typically play there.
const POSITIONS: &[(&str, usize)] = &[
    ("Goalkeeper", 3),
    ("Centre-Back", 4),
    ("Left-Back", 2),
    ("Right-Back", 2),
    ("Defensive Midfield", 2),
    ("Central Midfield", 3),
    ("Attacking Midfield", 2),
    ("Left Winger", 2),
    ("Right Winger", 2),
    ("Centre-Forward", 3),
];

const NATIONALITIES: &[&str] = &[
    "Spain", "Spain", "Spain", "Spain", "Argentina", "Brazil", "France", "Portugal", "Uruguay",
    "Morocco", "Germany", "Netherlands", "Belgium", "Croatia", "Colombia", "Senegal", "Nigeria",
    "Japan", "England", "Italy",
];

const FIRST_NAMES: &[&str] = &[
    "Álvaro", "Pablo", "Sergio", "Iker", "Dani", "Marcos", "Javi", "Hugo", "Raúl", "Unai", "Pedro",
    "Adrián", "Lucas", "Mateo", "Nico", "Rodrigo", "Diego", "Carlos", "Samuel", "Bryan", "Youssef",
    "Mamadou", "Takefusa", "Jules", "Rafa",
];

const LAST_NAMES: &[&str] = &[
    "García", "Fernández", "López", "Martínez", "Sánchez", "Pérez", "Gómez", "Ruiz", "Navarro",
    "Torres", "Domínguez", "Vázquez", "Ramos", "Gil", "Serrano", "Blanco", "Molina", "Morales",
    "Ortega", "Delgado", "Castro", "Ortiz", "Rubio", "Marín", "Sanz", "Iglesias", "Medina",
];

/// Offline stand-in for the live scraper. Produces the same record shape,
/// unique ids, and display values in the source's `€x,yym` / `€xk` format.
pub struct SyntheticSource {
    seed: Option<u64>,
    per_club: usize,
    league_name: String,
}

impl SyntheticSource {
    pub fn new(seed: Option<u64>, per_club: usize) -> Self {
        Self {
            seed,
            per_club: per_club.max(1),
            league_name: crate::config::DEFAULT_LEAGUE_NAME.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut source = Self::new(config.synthetic_seed, config.synthetic_per_club);
        source.league_name = config.league_name.clone();
        source
    }

    fn generate(&self, rng: &mut StdRng) -> Vec<PlayerRecord> {
        let mut players = Vec::with_capacity(LALIGA_CLUBS.len() * self.per_club);
        let mut used_names = HashSet::new();
        let mut next_id: u64 = 100_000 + rng.gen_range(0..10_000) * 10;

        for (club_idx, club) in LALIGA_CLUBS.iter().enumerate() {
            // Bigger clubs sit at the top of the table and carry richer squads.
            let club_scale = 1.0 + (LALIGA_CLUBS.len() - club_idx) as f64 / 4.0;
            let positions = squad_positions(self.per_club);
            for position in positions {
                next_id += rng.gen_range(1..=97);
                let name = unique_name(rng, &mut used_names);
                let nationality = NATIONALITIES
                    .choose(rng)
                    .copied()
                    .unwrap_or("Spain")
                    .to_string();
                let millions = sample_value_millions(rng, club_scale);
                players.push(PlayerRecord {
                    id: next_id.to_string(),
                    name,
                    position: position.to_string(),
                    nationality,
                    club: (*club).to_string(),
                    league: Some(self.league_name.clone()),
                    market_value: format_market_value(millions),
                    percentile: 0,
                });
            }
        }
        players
    }
}

impl PlayerSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn collect(&self) -> Vec<PlayerRecord> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let players = self.generate(&mut rng);
        info!(players = players.len(), seeded = self.seed.is_some(), "generated synthetic players");
        players
    }
}

/// Formats millions the way the source displays them: `€12,50m`, `€750k`.
pub fn format_market_value(millions: f64) -> String {
    if millions >= 1.0 {
        format!("€{:.2}m", millions).replace('.', ",")
    } else {
        let thousands = ((millions * 1000.0) / 25.0).round().max(1.0) * 25.0;
        format!("€{}k", thousands as u64)
    }
}

fn squad_positions(size: usize) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = POSITIONS
        .iter()
        .flat_map(|(pos, count)| std::iter::repeat(*pos).take(*count))
        .collect();
    let mut idx = 0;
    while out.len() < size {
        out.push(POSITIONS[idx % POSITIONS.len()].0);
        idx += 1;
    }
    out.truncate(size);
    out
}

fn unique_name(rng: &mut StdRng, used: &mut HashSet<String>) -> String {
    for _ in 0..32 {
        let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Jugador");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("Anónimo");
        let candidate = format!("{first} {last}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
    let fallback = format!("Jugador {}", used.len() + 1);
    used.insert(fallback.clone());
    fallback
}

/// Log-uniform draw so most players sit in the low millions with a long tail.
fn sample_value_millions(rng: &mut StdRng, club_scale: f64) -> f64 {
    let exp: f64 = rng.gen_range(-1.3..1.6);
    let raw = 10f64.powf(exp) * club_scale;
    if raw >= 1.0 {
        (raw * 20.0).round() / 20.0
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::format_market_value;

    #[test]
    fn formats_millions_with_decimal_comma() {
        assert_eq!(format_market_value(12.5), "€12,50m");
        assert_eq!(format_market_value(1.0), "€1,00m");
    }

    #[test]
    fn formats_thousands_rounded_to_quarter_steps() {
        assert_eq!(format_market_value(0.75), "€750k");
        assert_eq!(format_market_value(0.001), "€25k");
    }
}
