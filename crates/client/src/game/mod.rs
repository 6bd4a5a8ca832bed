// Local mirror of the server's world state.
use glam::DVec2;
use protocol::packets::{Border, LeaderboardEntry, ServerPacket, TeamScores, WorldUpdate};
use std::collections::{HashMap, HashSet};
use tracing::debug;

mod cell;

pub use cell::Cell;

/// Everything the client knows about the world.
///
/// Mutated only through [`World::apply`], which never fails: packets are
/// fully decoded before they get here, so a batch is applied whole or not
/// at all.
#[derive(Debug, Default)]
pub struct World {
    cells: HashMap<u32, Cell>,
    my_ids: HashSet<u32>,
    leaderboard: Vec<LeaderboardEntry>,
    team_scores: Option<TeamScores>,
    border: Option<Border>,
    /// Last target sent to the server; the origin means "no target".
    target: DVec2,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one decoded packet.
    pub fn apply(&mut self, packet: &ServerPacket) {
        match packet {
            ServerPacket::UpdateNodes(update) => self.apply_update(update),
            ServerPacket::AddNode { node_id } => {
                self.my_ids.insert(*node_id);
            }
            ServerPacket::Leaderboard(entries) => self.leaderboard = entries.clone(),
            ServerPacket::TeamLeaderboard(scores) => self.team_scores = Some(*scores),
            ServerPacket::SetBorder(border) => self.border = Some(*border),
            ServerPacket::Hello => debug!("Server greeted us"),
        }
    }

    /// Destroyed cells go first, then updates, then cleanups. A cell can be
    /// destroyed and cleaned in the same batch.
    fn apply_update(&mut self, update: &WorldUpdate) {
        for eat in &update.destroyed {
            if let (Some(attacker), Some(victim)) =
                (self.cells.get(&eat.attacker_id), self.cells.get(&eat.victim_id))
            {
                debug!(
                    "{:?} ({}) destroyed {:?} ({})",
                    attacker.name, attacker.size, victim.name, victim.size
                );
            }
            self.cells.remove(&eat.victim_id);
        }

        for node in &update.updated {
            match self.cells.get_mut(&node.node_id) {
                Some(cell) => cell.update(node),
                None => {
                    self.cells.insert(node.node_id, Cell::new(node));
                }
            }
        }

        for id in &update.cleaned {
            self.cells.remove(id);
            if self.my_ids.remove(id) && self.my_ids.is_empty() {
                self.target = DVec2::ZERO;
            }
        }
    }

    /// All visible cells by id.
    pub fn cells(&self) -> &HashMap<u32, Cell> {
        &self.cells
    }

    pub fn cell(&self, id: u32) -> Option<&Cell> {
        self.cells.get(&id)
    }

    /// Ids of the cells the local player controls.
    pub fn my_ids(&self) -> &HashSet<u32> {
        &self.my_ids
    }

    /// The local player's cells that are currently visible.
    pub fn my_cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.my_ids.iter().filter_map(|id| self.cells.get(id))
    }

    /// True while the local player controls at least one cell.
    pub fn is_alive(&self) -> bool {
        !self.my_ids.is_empty()
    }

    /// FFA leaderboard, best first.
    pub fn leaderboard(&self) -> &[LeaderboardEntry] {
        &self.leaderboard
    }

    pub fn team_scores(&self) -> Option<TeamScores> {
        self.team_scores
    }

    pub fn border(&self) -> Option<Border> {
        self.border
    }

    pub fn target(&self) -> DVec2 {
        self.target
    }

    pub(crate) fn set_target(&mut self, target: DVec2) {
        self.target = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use protocol::packets::{CellFlags, EatRecord, UpdateCell};
    use protocol::Color;

    fn node(id: u32, x: i16, y: i16, name: &str) -> UpdateCell {
        UpdateCell {
            node_id: id,
            x,
            y,
            size: 50,
            color: Color::new(1, 2, 3),
            flags: CellFlags::new(0),
            name: name.to_string(),
        }
    }

    fn batch(destroyed: &[(u32, u32)], updated: Vec<UpdateCell>, cleaned: &[u32]) -> ServerPacket {
        ServerPacket::UpdateNodes(WorldUpdate {
            destroyed: destroyed
                .iter()
                .map(|&(attacker_id, victim_id)| EatRecord { attacker_id, victim_id })
                .collect(),
            updated,
            cleaned: cleaned.to_vec(),
        })
    }

    #[test]
    fn test_first_sighting_and_destruction() {
        let mut world = World::new();
        world.apply(&batch(&[], vec![node(2, 0, 0, "victim")], &[]));
        assert!(world.cell(2).is_some());

        world.apply(&batch(&[(1, 2)], vec![node(1, 10, 10, "A")], &[]));

        let cell = world.cell(1).expect("cell 1 inserted");
        assert_eq!(cell.position, Vec2::new(10.0, 10.0));
        assert_eq!(cell.size, 50);
        assert_eq!(cell.color, Color::new(1, 2, 3));
        assert_eq!(cell.name, "A");
        assert_eq!(cell.heading, Vec2::ZERO);
        assert!(!cell.is_virus);
        assert!(world.cell(2).is_none());
        assert_eq!(world.cells().len(), 1);
    }

    #[test]
    fn test_update_moves_existing_cell() {
        let mut world = World::new();
        world.apply(&batch(&[], vec![node(1, 0, 0, "A")], &[]));
        world.apply(&batch(&[], vec![node(1, 0, 20, "")], &[]));
        let cell = world.cell(1).expect("cell 1");
        assert_eq!(cell.heading, Vec2::new(0.0, 1.0));
        assert_eq!(cell.name, "A");
    }

    #[test]
    fn test_destroy_then_update_same_id_reinserts() {
        let mut world = World::new();
        world.apply(&batch(&[], vec![node(5, 0, 0, "old")], &[]));
        world.apply(&batch(&[(9, 5)], vec![node(5, 40, 0, "new")], &[]));

        // The update runs after the destruction, so this is a fresh sighting.
        let cell = world.cell(5).expect("cell 5 re-created");
        assert_eq!(cell.name, "new");
        assert_eq!(cell.heading, Vec2::ZERO);
    }

    #[test]
    fn test_update_then_clean_same_id_removes() {
        let mut world = World::new();
        world.apply(&batch(&[], vec![node(5, 0, 0, "")], &[5]));
        assert!(world.cell(5).is_none());
    }

    #[test]
    fn test_destroy_and_clean_same_id() {
        let mut world = World::new();
        world.apply(&batch(&[], vec![node(5, 0, 0, ""), node(6, 0, 0, "")], &[]));
        world.apply(&batch(&[(6, 5)], vec![], &[5]));
        assert!(world.cell(5).is_none());
        assert!(world.cell(6).is_some());
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let mut world = World::new();
        world.apply(&batch(&[(100, 200)], vec![], &[300]));
        assert!(world.cells().is_empty());
    }

    #[test]
    fn test_owned_ids_and_target_reset() {
        let mut world = World::new();
        world.apply(&ServerPacket::AddNode { node_id: 1 });
        world.apply(&ServerPacket::AddNode { node_id: 2 });
        world.apply(&ServerPacket::AddNode { node_id: 2 });
        assert_eq!(world.my_ids().len(), 2);
        world.apply(&batch(&[], vec![node(1, 0, 0, "me"), node(2, 5, 5, "me")], &[]));
        assert_eq!(world.my_cells().count(), 2);

        world.set_target(DVec2::new(100.0, 50.0));

        world.apply(&batch(&[], vec![], &[1]));
        assert!(world.is_alive());
        assert_eq!(world.target(), DVec2::new(100.0, 50.0));

        world.apply(&batch(&[], vec![], &[2]));
        assert!(!world.is_alive());
        assert_eq!(world.target(), DVec2::ZERO);
    }

    #[test]
    fn test_destruction_does_not_release_ownership() {
        let mut world = World::new();
        world.apply(&ServerPacket::AddNode { node_id: 1 });
        world.apply(&batch(&[], vec![node(1, 0, 0, "me")], &[]));
        world.set_target(DVec2::new(1.0, 1.0));
        world.apply(&batch(&[(7, 1)], vec![], &[]));
        assert!(world.cell(1).is_none());
        assert!(world.my_ids().contains(&1));
        assert_eq!(world.target(), DVec2::new(1.0, 1.0));
    }

    #[test]
    fn test_wholesale_replacements() {
        let mut world = World::new();
        world.apply(&ServerPacket::Leaderboard(vec![
            LeaderboardEntry { id: 1, name: "a".into() },
            LeaderboardEntry { id: 2, name: "b".into() },
        ]));
        world.apply(&ServerPacket::Leaderboard(vec![LeaderboardEntry { id: 3, name: "c".into() }]));
        assert_eq!(world.leaderboard(), &[LeaderboardEntry { id: 3, name: "c".into() }]);

        let scores = TeamScores { red: 0.2, green: 0.3, blue: 0.5 };
        world.apply(&ServerPacket::TeamLeaderboard(scores));
        assert_eq!(world.team_scores(), Some(scores));

        let border = Border { left: 0.0, top: 0.0, right: 10.0, bottom: 20.0 };
        world.apply(&ServerPacket::SetBorder(border));
        assert_eq!(world.border(), Some(border));

        world.apply(&ServerPacket::Hello);
        assert_eq!(world.border(), Some(border));
    }
}
