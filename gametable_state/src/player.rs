// Players and the roster.
//
// The roster is the ordered list of session participants as this process
// knows it. Index `local` is always the participant running this process;
// it survives every reset. On the host the roster is authoritative and
// `gametable_net::session` adds and removes entries. On a joiner it is
// replaced wholesale each time a `Roster` message arrives, with the "you"
// index from that message telling it which entry is itself.

use gametable_protocol::{ConnectionId, PlayerData, PlayerId, Point};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub player_name: String,
    pub character_name: String,
    pub id: PlayerId,
    pub host: bool,
    pub pointer: Point,
    pub pointing: bool,
    /// Connection this player is reached through. `None` for the local
    /// player, and for every remote player on a joiner (it only talks to
    /// the host).
    pub connection: Option<ConnectionId>,
}

impl Player {
    pub fn new(player_name: impl Into<String>, character_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            character_name: character_name.into(),
            id: PlayerId::UNASSIGNED,
            host: false,
            pointer: Point::default(),
            pointing: false,
            connection: None,
        }
    }

    pub fn from_data(data: &PlayerData) -> Self {
        Self {
            player_name: data.player_name.clone(),
            character_name: data.character_name.clone(),
            id: data.id,
            host: data.host,
            pointer: Point::default(),
            pointing: false,
            connection: None,
        }
    }

    pub fn to_data(&self) -> PlayerData {
        PlayerData {
            player_name: self.player_name.clone(),
            character_name: self.character_name.clone(),
            id: self.id,
            host: self.host,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Roster {
    players: Vec<Player>,
    local: usize,
}

impl Roster {
    pub fn new(local: Player) -> Self {
        Self {
            players: vec![local],
            local: 0,
        }
    }

    pub fn local(&self) -> &Player {
        &self.players[self.local]
    }

    pub(crate) fn local_mut(&mut self) -> &mut Player {
        &mut self.players[self.local]
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn by_connection(&self, connection: ConnectionId) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.connection == Some(connection))
    }

    /// Drop everyone but the local player.
    pub(crate) fn reset_to_local(&mut self) {
        let local = self.players.swap_remove(self.local);
        self.players = vec![local];
        self.local = 0;
    }

    /// Replace the roster from a `Roster` message. `you` is the index of
    /// this process's entry. Local pointer state is kept. An out-of-range
    /// index leaves the roster untouched and returns `false`.
    pub(crate) fn replace_from_wire(&mut self, players: &[PlayerData], you: i32) -> bool {
        let Some(you) = usize::try_from(you).ok().filter(|i| *i < players.len()) else {
            return false;
        };
        let old_local = self.local().clone();
        self.players = players.iter().map(Player::from_data).collect();
        self.local = you;
        let local = self.local_mut();
        local.pointer = old_local.pointer;
        local.pointing = old_local.pointing;
        true
    }

    pub(crate) fn push(&mut self, player: Player) {
        self.players.push(player);
    }

    /// Remove a remote player. The local player is never removed.
    pub(crate) fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        if index == self.local {
            return None;
        }
        if index < self.local {
            self.local -= 1;
        }
        Some(self.players.remove(index))
    }

    pub fn to_data(&self) -> Vec<PlayerData> {
        self.players.iter().map(Player::to_data).collect()
    }

    /// Index of `id` in roster order, as sent in a `Roster` message.
    pub fn index_of(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(name: &str, id: i32, host: bool) -> PlayerData {
        PlayerData {
            player_name: name.into(),
            character_name: format!("{name}'s hero"),
            id: PlayerId(id),
            host,
        }
    }

    #[test]
    fn reset_keeps_only_local() {
        let mut roster = Roster::new(Player::new("me", "Me"));
        roster.push(Player::from_data(&data("other", 3, false)));
        roster.reset_to_local();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.local().player_name, "me");
    }

    #[test]
    fn replace_from_wire_tracks_you_index() {
        let mut roster = Roster::new(Player::new("cole", "Rogue"));
        roster.local_mut().pointer = Point::new(5, 5);
        let wire = [data("hana", 0, true), data("cole", 1, false)];
        assert!(roster.replace_from_wire(&wire, 1));
        assert_eq!(roster.local().id, PlayerId(1));
        assert_eq!(roster.local().pointer, Point::new(5, 5));
        assert!(roster.get(PlayerId::HOST).unwrap().host);
    }

    #[test]
    fn bad_you_index_is_refused() {
        let mut roster = Roster::new(Player::new("cole", "Rogue"));
        let wire = [data("hana", 0, true)];
        assert!(!roster.replace_from_wire(&wire, 4));
        assert!(!roster.replace_from_wire(&wire, -1));
        assert_eq!(roster.local().player_name, "cole");
    }

    #[test]
    fn remove_keeps_local_index_valid() {
        let mut roster = Roster::new(Player::new("d", "D"));
        let wire = [data("h", 0, true), data("c", 1, false), data("d", 2, false)];
        roster.replace_from_wire(&wire, 2);
        assert!(roster.remove(PlayerId(1)).is_some());
        assert_eq!(roster.local().player_name, "d");
        assert!(roster.remove(PlayerId(2)).is_none(), "local player removed");
    }
}
