use rand::Rng;
use shared::{Color, EntityId, PlayerId, ScoreRow};

pub const PALETTE: [Color; 14] = [
    Color::new(0xff, 0x00, 0x00),
    Color::new(0x80, 0x80, 0x80),
    Color::new(0xf5, 0xde, 0xb3),
    Color::new(0xd2, 0xb4, 0x8c),
    Color::new(0xff, 0x14, 0x93),
    Color::new(0xff, 0x45, 0x00),
    Color::new(0x00, 0x00, 0xff),
    Color::new(0x80, 0x80, 0x00),
    Color::new(0x5e, 0xb3, 0x6c),
    Color::new(0xb3, 0x60, 0x69),
    Color::new(0x00, 0x26, 0x53),
    Color::new(0x6a, 0x14, 0xb3),
    Color::new(0x57, 0x39, 0x20),
    Color::new(0x60, 0x19, 0x27),
];

/// A participant that outlives avatars and rounds. Inactive players keep their score until
/// the next reset so that a reconnect can pick it up again.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub nick: String,
    pub color: Color,
    pub kills: u32,
    pub deaths: u32,
    pub active: bool,
    pub avatar: Option<EntityId>,
}

impl Player {
    pub fn new(id: PlayerId, nick: String, color: Color) -> Self {
        Self {
            id,
            nick,
            color,
            kills: 0,
            deaths: 0,
            active: true,
            avatar: None,
        }
    }

    pub fn score_row(&self) -> ScoreRow {
        ScoreRow {
            id: self.id,
            nick: self.nick.clone(),
            kills: self.kills,
            deaths: self.deaths,
        }
    }
}

/// Hands out palette colours, unique ones first. Once every colour is taken, duplicates are
/// drawn from the whole palette.
#[derive(Debug, Clone)]
pub struct ColorPool {
    available: Vec<Color>,
}

impl Default for ColorPool {
    fn default() -> Self {
        Self {
            available: PALETTE.to_vec(),
        }
    }
}

impl ColorPool {
    pub fn take<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Color {
        if self.available.is_empty() {
            PALETTE[rng.gen_range(0..PALETTE.len())]
        } else {
            let index = rng.gen_range(0..self.available.len());
            self.available.swap_remove(index)
        }
    }

    pub fn give_back(&mut self, color: Color) {
        if !self.available.contains(&color) {
            self.available.push(color);
        }
    }

    pub fn available(&self) -> usize {
        self.available.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_unique_colours_first() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pool = ColorPool::default();
        let taken: HashSet<String> = (0..PALETTE.len())
            .map(|_| pool.take(&mut rng).to_string())
            .collect();
        assert_eq!(taken.len(), PALETTE.len());
        assert_eq!(pool.available(), 0);

        let extra = pool.take(&mut rng);
        assert!(PALETTE.contains(&extra));
    }

    #[test]
    fn test_give_back() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut pool = ColorPool::default();
        let color = pool.take(&mut rng);
        assert_eq!(pool.available(), PALETTE.len() - 1);
        pool.give_back(color);
        pool.give_back(color);
        assert_eq!(pool.available(), PALETTE.len());
    }

    #[test]
    fn test_score_row() {
        let mut player = Player::new(4, "ann".to_string(), PALETTE[0]);
        player.kills = 3;
        let row = player.score_row();
        assert_eq!(row.id, 4);
        assert_eq!(row.nick, "ann");
        assert_eq!(row.kills, 3);
        assert_eq!(row.deaths, 0);
    }
}
