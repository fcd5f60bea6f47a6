//! UDP transport for the arena: admits players, forwards their packets to the game runner
//! and fans out whatever the runner produces each tick.

use crate::client_manager::ClientManager;
use crate::runner::{GameRunner, JoinOutcome};
use bincode::serialize;
use log::{debug, error, info, warn};
use shared::{decode, unix_millis, Packet, PlayerId, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Events delivered to the main loop by the receiver and timeout tasks.
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { player: PlayerId },
    Shutdown,
}

/// Outgoing datagrams, addressed either directly or by player.
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    SendToPlayer { packet: Packet, player: PlayerId },
}

/// Owns the socket, the client table and the [`GameRunner`].
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    runner: GameRunner,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        runner: GameRunner,
        tick_duration: Duration,
        max_clients: usize,
        client_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients, client_timeout))),
            runner,
            tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// A sender that can stop [`Server::run`] from another task.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn runner(&self) -> &GameRunner {
        &self.runner
    }

    /// Decodes datagrams and hands them to the main loop. Malformed ones are dropped.
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping malformed datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Serializes queued packets, resolving player ids to their bound address.
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let Some(mut game_rx) = self.game_rx.take() else {
            warn!("Network sender already running");
            return;
        };

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                let (packet, addr) = match message {
                    GameMessage::SendPacket { packet, addr } => (packet, addr),
                    GameMessage::SendToPlayer { packet, player } => {
                        let addr = clients.read().await.addr_of(player);
                        match addr {
                            Some(addr) => (packet, addr),
                            None => {
                                debug!("Dropping {} for departed player {}", packet.kind(), player);
                                continue;
                            }
                        }
                    }
                };
                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    /// Once a second, drops clients that have gone quiet.
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for player in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { player }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn send_to_player(&self, packet: Packet, player: PlayerId) {
        if let Err(e) = self.game_tx.send(GameMessage::SendToPlayer { packet, player }) {
            error!("Failed to queue packet for player {}: {}", player, e);
        }
    }

    /// Admits a joining client or tells it why not.
    async fn handle_join(&mut self, version: u32, nickname: String, addr: SocketAddr) {
        info!("Join request from {} as '{}'", addr, nickname);
        if version != PROTOCOL_VERSION {
            let reason = format!("Protocol version {} required, got {}", PROTOCOL_VERSION, version);
            self.send_packet(Packet::SessionEnd { reason }, addr);
            return;
        }

        // A repeated join from a bound address replaces the old session.
        let existing = self.clients.read().await.find_client_by_addr(addr);
        if let Some(player) = existing {
            info!("Replacing session of player {} from {}", player, addr);
            self.clients.write().await.remove_client(player);
            self.runner.leave(player);
        }

        if self.clients.read().await.is_full() {
            self.send_packet(
                Packet::SessionEnd {
                    reason: "Server full".to_string(),
                },
                addr,
            );
            return;
        }

        match self.runner.join(&nickname, unix_millis()) {
            JoinOutcome::Accepted { player, welcome } => {
                self.clients.write().await.add_client(player, addr);
                self.send_packet(welcome, addr);
            }
            JoinOutcome::Rejected { reason } => {
                info!("Rejected '{}' from {}: {}", nickname, addr, reason);
                self.send_packet(Packet::SessionEnd { reason }, addr);
            }
        }
    }

    /// Routes a packet from a bound client to the runner; joins are handled separately.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::JoinRequest { version, nickname } = packet {
            self.handle_join(version, nickname, addr).await;
            return;
        }

        let player = self.clients.write().await.touch(addr);
        let Some(player) = player else {
            warn!("Unexpected {} from unknown address {}", packet.kind(), addr);
            return;
        };

        if let Packet::Leave = packet {
            self.clients.write().await.remove_client(player);
        }
        if let Some(reply) = self.runner.handle_packet(player, packet, unix_millis()) {
            self.send_packet(reply, addr);
        }
    }

    /// Runs every due step and queues what it produced.
    fn tick(&mut self) {
        for (player, packet) in self.runner.update(unix_millis()) {
            self.send_to_player(packet, player);
        }
    }

    /// Serves until a [`ServerMessage::Shutdown`] arrives.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Arena server listening on {}", self.socket.local_addr()?);

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { player }) => {
                            info!("Player {} timed out", player);
                            self.runner.leave(player);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.tick();
                    let ticks = self.runner.simulation().ticks();
                    if ticks > 0 && ticks % 500 == 0 {
                        debug!("Tick {}: {} clients", ticks, self.clients.read().await.len());
                    }
                },
            }
        }

        Ok(())
    }
}
