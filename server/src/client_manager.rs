//! Tracks which address belongs to which admitted player.
//!
//! A datagram from an unknown address is only accepted if it is a join request; once the
//! runner admits the player, the address is bound to the player id here. The manager also
//! enforces the capacity limit and detects clients that went silent.

use log::info;
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Client {
    pub player: PlayerId,
    pub addr: SocketAddr,
    pub last_seen: Instant,
}

impl Client {
    pub fn new(player: PlayerId, addr: SocketAddr) -> Self {
        Self {
            player,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
            timeout,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Binds `addr` to an admitted player. Fails when the server is full.
    pub fn add_client(&mut self, player: PlayerId, addr: SocketAddr) -> bool {
        if self.is_full() {
            return false;
        }
        info!("Player {} connected from {}", player, addr);
        self.clients.insert(player, Client::new(player, addr));
        true
    }

    pub fn remove_client(&mut self, player: PlayerId) -> bool {
        if self.clients.remove(&player).is_some() {
            info!("Player {} disconnected", player);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.player)
    }

    pub fn addr_of(&self, player: PlayerId) -> Option<SocketAddr> {
        self.clients.get(&player).map(|client| client.addr)
    }

    /// Refreshes the activity timestamp of whoever sent from `addr`.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        let client = self.clients.values_mut().find(|client| client.addr == addr)?;
        client.touch();
        Some(client.player)
    }

    /// Removes and returns every client silent for longer than the timeout.
    pub fn check_timeouts(&mut self) -> Vec<PlayerId> {
        let timed_out: Vec<PlayerId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(self.timeout))
            .map(|client| client.player)
            .collect();

        for player in &timed_out {
            self.remove_client(*player);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(PlayerId, SocketAddr)> {
        self.clients
            .values()
            .map(|client| (client.player, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn manager(max_clients: usize) -> ClientManager {
        ClientManager::new(max_clients, Duration::from_secs(5))
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());
        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_and_find_client() {
        let mut manager = manager(2);
        assert!(manager.is_empty());
        assert!(manager.add_client(7, test_addr()));
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.find_client_by_addr(test_addr()), Some(7));
        assert_eq!(manager.find_client_by_addr(test_addr2()), None);
        assert_eq!(manager.addr_of(7), Some(test_addr()));
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = manager(1);
        assert!(manager.add_client(1, test_addr()));
        assert!(manager.is_full());
        assert!(!manager.add_client(2, test_addr2()));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = manager(2);
        manager.add_client(3, test_addr());
        assert!(manager.remove_client(3));
        assert!(!manager.remove_client(3));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = manager(2);
        manager.add_client(1, test_addr());
        manager.add_client(2, test_addr2());
        if let Some(client) = manager.clients.get_mut(&1) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }

        let timed_out = manager.check_timeouts();
        assert_eq!(timed_out, vec![1]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.touch(test_addr2()), Some(2));
        assert_eq!(manager.touch(test_addr()), None);
    }
}
