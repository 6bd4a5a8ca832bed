use glam::Vec2;
use protocol::packets::UpdateCell;
use protocol::{Color, Position};

/// Represents a cell in the game world, as last reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub id: u32,
    pub name: String,
    /// Current position.
    pub position: Position,
    /// Unit vector from the previous to the current position; zero when the
    /// cell has not moved since its last update (or was just seen).
    pub heading: Vec2,
    pub size: i32,
    pub color: Color,
    pub is_virus: bool,
    pub is_agitated: bool,
}

impl Cell {
    /// Create a cell from its first sighting.
    pub fn new(update: &UpdateCell) -> Self {
        Self {
            id: update.node_id,
            name: update.name.clone(),
            position: Vec2::new(update.x as f32, update.y as f32),
            heading: Vec2::ZERO,
            size: update.size as i32,
            color: update.color,
            is_virus: update.flags.is_virus(),
            is_agitated: update.flags.is_agitated(),
        }
    }

    /// Merge a later update into this cell.
    pub fn update(&mut self, update: &UpdateCell) {
        let new_position = Vec2::new(update.x as f32, update.y as f32);
        self.heading = (new_position - self.position).normalize_or_zero();
        self.position = new_position;

        self.size = update.size as i32;
        self.color = update.color;
        self.is_virus = update.flags.is_virus();
        self.is_agitated = update.flags.is_agitated();

        // Names are only sent occasionally.
        if !update.name.is_empty() {
            self.name.clone_from(&update.name);
        }
    }

    /// Distance covered per server tick at this size.
    pub fn speed(&self) -> f32 {
        745.28 * (self.size.max(1) as f32).powf(-0.222) * 50.0 / 1000.0
    }

    /// Squared reach of a split from this cell.
    pub fn split_distance(&self) -> f32 {
        let reach = 4.0 * (40.0 + self.speed() * 4.0) + self.size as f32 * 1.75 + 100.0;
        reach * reach
    }
}
