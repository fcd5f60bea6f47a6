use crate::input::{Bot, Controls, InputManager};
use crate::session::{Session, SessionState};
use crate::strategy::RenderStrategy;
use crate::view::{compose, Frame};
use bincode::serialize;
use log::{debug, error, info, warn};
use shared::{decode, unix_millis, Packet, SnapshotHistory, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub nickname: String,
    pub ping_interval: Duration,
    pub frame_interval: Duration,
    pub input_interval: Duration,
    /// Frames between two log lines describing what would be drawn.
    pub report_every: u64,
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    config: ClientConfig,

    session: Session,
    strategy: Box<dyn RenderStrategy>,
    input_manager: InputManager,
    bot: Option<Bot>,

    frames: u64,
    last_frame: Option<Frame>,
}

impl Client {
    pub async fn new(
        config: ClientConfig,
        strategy: Box<dyn RenderStrategy>,
        bot: Option<Bot>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = config.server.parse()?;

        let mut history = SnapshotHistory::default();
        strategy.configure_history(&mut history);
        info!("Using {} strategy", strategy.name());

        Ok(Client {
            socket,
            server_addr,
            config,
            session: Session::new(history),
            strategy,
            input_manager: InputManager::new(),
            bot,
            frames: 0,
            last_frame: None,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Joining {} as '{}'", self.server_addr, self.config.nickname);
        let packet = Packet::JoinRequest {
            version: PROTOCOL_VERSION,
            nickname: self.config.nickname.clone(),
        };
        self.send_packet(&packet).await
    }

    async fn send_ping(&self) {
        if let Err(e) = self
            .send_packet(&Packet::Ping {
                client_time: unix_millis(),
            })
            .await
        {
            error!("Error sending ping: {}", e);
        }
    }

    async fn send_input(&mut self) {
        if self.session.state != SessionState::Playing {
            return;
        }
        let controls = match &mut self.bot {
            Some(bot) => bot.update(unix_millis()),
            None => Controls::default(),
        };
        for packet in self.input_manager.update(&controls) {
            if let Err(e) = self.send_packet(&packet).await {
                error!("Error sending input: {}", e);
            }
        }
    }

    fn render(&mut self) {
        let server_now = self.session.clock.server_now(unix_millis());
        let Some(frame) = compose(self.strategy.as_mut(), &self.session.history, server_now) else {
            return;
        };
        self.frames += 1;
        if self.config.report_every > 0 && self.frames % self.config.report_every == 0 {
            info!(
                "Frame {} (tick {}): {} avatars, {} projectiles, health {}, {}, latency {:.0}ms",
                self.frames,
                frame.tick,
                frame.avatars().count(),
                frame.projectiles().count(),
                self.session.health,
                self.session.ammo,
                self.session.clock.latency()
            );
        }
        self.last_frame = Some(frame);
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut ping_interval = interval(self.config.ping_interval);
        let mut input_interval = interval(self.config.input_interval);
        let mut render_interval = interval(self.config.frame_interval);

        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) if addr == self.server_addr => match decode(&buffer[..len]) {
                            Ok(packet) => self.session.handle(packet, unix_millis()),
                            Err(e) => warn!("Dropping malformed datagram: {}", e),
                        },
                        Ok((_, addr)) => debug!("Ignoring datagram from {}", addr),
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                    if let SessionState::Ended { reason } = &self.session.state {
                        info!("Disconnected: {}", reason);
                        return Ok(());
                    }
                },

                _ = ping_interval.tick() => {
                    self.send_ping().await;
                },

                _ = input_interval.tick() => {
                    self.send_input().await;
                },

                _ = render_interval.tick() => {
                    self.render();
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Leaving");
                    break;
                },
            }
        }

        if self.session.is_connected() {
            let _ = self.send_packet(&Packet::Leave).await;
        }

        Ok(())
    }
}
