//! Client state: networks, buffers, and the server-line reactor.
//!
//! The client owns every network connection and the buffers hanging off
//! them. Each tick the event loop drains all sockets through
//! [`Client::poll`], which turns server lines into buffer messages and
//! activity marks; key handling lives in [`input`].

pub mod buffer;
pub mod input;
pub mod irc;
pub mod message;

use regex::Regex;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::ui::compose::nick_color;
use crate::ui::term::Color;
use crate::ui::window::WindowTree;

use buffer::{Activity, Buffer, BufferId, BufferKind};
use irc::{Connection, ConnectionError, IrcMessage};
use message::{painted, Message};

const QUIT_COLOR: Color = Color::new(240, 60, 60);
const JOIN_COLOR: Color = Color::new(60, 240, 60);
const MISC_COLOR: Color = Color::new(233, 45, 250);

/// Case-insensitive whole-word pattern for the own nick.
fn mention_regex(nick: &str) -> Option<Regex> {
    let pattern = format!(
        "(?i)(^|[^a-zA-Z0-9_]){}($|[^a-zA-Z0-9_])",
        regex::escape(nick)
    );
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("bad mention pattern for {nick:?}: {e}");
            None
        }
    }
}

pub struct Network {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub nick: String,
    pub username: String,
    pub realname: String,
    pub channels: Vec<String>,
    /// Index 0 is always the server buffer.
    pub buffers: Vec<Buffer>,
    conn: Option<Connection>,
    mention: Option<Regex>,
}

impl Network {
    fn server_buffer_id(&self) -> BufferId {
        self.buffers[0].id
    }

    fn buffer_by_name(&mut self, name: &str) -> Option<&mut Buffer> {
        self.buffers
            .iter_mut()
            .find(|b| b.name.eq_ignore_ascii_case(name))
    }

    fn send(&mut self, line: &str) {
        let Some(conn) = self.conn.as_mut() else {
            return;
        };
        if let Err(e) = conn.send(line) {
            error!("send to {} failed: {e}", self.name);
            self.conn = None;
            self.buffers[0].push(Message::new("[error]", format!("send failed: {e}")));
        }
    }
}

/// What one round of socket polling produced.
#[derive(Default)]
pub struct PollOutcome {
    /// Something changed; a redraw is due.
    pub dirty: bool,
    /// Ring the terminal bell.
    pub bell: bool,
    /// Switch the focused leaf to this buffer (own channel join).
    pub switch_to: Option<BufferId>,
}

pub struct Client {
    pub networks: Vec<Network>,
    next_id: BufferId,
}

impl Client {
    pub fn new(config: &Config) -> Self {
        let mut client = Self {
            networks: Vec::new(),
            next_id: 0,
        };

        for net in &config.networks {
            let id = client.alloc_id();
            let mut server_buffer = Buffer::new(id, BufferKind::Server, net.server.clone());
            server_buffer.push(Message::new("[status]", format!("network {}", net.name)));

            client.networks.push(Network {
                name: net.name.clone(),
                server: net.server.clone(),
                port: net.port,
                nick: net.nick.clone(),
                username: net.username.clone(),
                realname: net.realname.clone(),
                channels: net.channels.clone(),
                buffers: vec![server_buffer],
                conn: None,
                mention: mention_regex(&net.nick),
            });
        }

        client
    }

    fn alloc_id(&mut self) -> BufferId {
        self.next_id += 1;
        self.next_id
    }

    /// Open every configured connection and register. Failures land in
    /// the network's server buffer instead of aborting startup.
    pub fn connect_all(&mut self) {
        for network in &mut self.networks {
            info!("connecting to {}:{}", network.server, network.port);
            match Connection::connect(&network.server, network.port) {
                Ok(mut conn) => {
                    if let Err(e) =
                        conn.register(&network.nick, &network.username, &network.realname)
                    {
                        error!("registration with {} failed: {e}", network.name);
                        network.buffers[0]
                            .push(Message::new("[error]", format!("registration failed: {e}")));
                        continue;
                    }
                    network.conn = Some(conn);
                }
                Err(e) => {
                    error!("connect to {} failed: {e}", network.name);
                    network.buffers[0]
                        .push(Message::new("[error]", format!("connect failed: {e}")));
                }
            }
        }
    }

    /// Send the configured autojoins on every live connection.
    pub fn join_channels(&mut self) {
        for network in &mut self.networks {
            if network.conn.is_none() {
                continue;
            }
            for channel in network.channels.clone() {
                network.send(&format!("JOIN :{channel}"));
            }
        }
    }

    pub fn locate(&self, id: BufferId) -> Option<(&Network, &Buffer)> {
        for network in &self.networks {
            if let Some(buffer) = network.buffers.iter().find(|b| b.id == id) {
                return Some((network, buffer));
            }
        }
        None
    }

    pub fn buffer_mut(&mut self, id: BufferId) -> Option<&mut Buffer> {
        self.networks
            .iter_mut()
            .flat_map(|n| n.buffers.iter_mut())
            .find(|b| b.id == id)
    }

    pub fn first_buffer(&self) -> BufferId {
        self.networks[0].server_buffer_id()
    }

    fn flat_ids(&self) -> Vec<BufferId> {
        self.networks
            .iter()
            .flat_map(|n| n.buffers.iter().map(|b| b.id))
            .collect()
    }

    /// The buffer after `current`, cycling across networks.
    pub fn next_buffer(&self, current: BufferId) -> BufferId {
        let ids = self.flat_ids();
        let pos = ids.iter().position(|&id| id == current).unwrap_or(0);
        ids[(pos + 1) % ids.len()]
    }

    /// The buffer before `current`, cycling across networks.
    pub fn prev_buffer(&self, current: BufferId) -> BufferId {
        let ids = self.flat_ids();
        let pos = ids.iter().position(|&id| id == current).unwrap_or(0);
        ids[(pos + ids.len() - 1) % ids.len()]
    }

    /// The next buffer with unseen activity, or `current` when there is
    /// none.
    pub fn jump_active(&self, current: BufferId) -> BufferId {
        let mut id = self.next_buffer(current);
        while id != current {
            if self
                .locate(id)
                .is_some_and(|(_, b)| b.activity != Activity::None)
            {
                return id;
            }
            id = self.next_buffer(id);
        }
        current
    }

    /// The server buffer of the network owning `current`.
    pub fn jump_server(&self, current: BufferId) -> BufferId {
        for network in &self.networks {
            if network.buffers.iter().any(|b| b.id == current) {
                return network.server_buffer_id();
            }
        }
        current
    }

    /// Part (for channels) and drop the buffer, pointing every window
    /// that showed it at the previous buffer in its network. Server
    /// buffers cannot be left.
    pub fn leave_buffer(&mut self, current: BufferId, tree: &mut WindowTree) {
        for network in &mut self.networks {
            let Some(pos) = network.buffers.iter().position(|b| b.id == current) else {
                continue;
            };
            if network.buffers[pos].kind == BufferKind::Server {
                return;
            }
            if network.buffers[pos].kind == BufferKind::Channel {
                let name = network.buffers[pos].name.clone();
                network.send(&format!("PART {name} :Leaving"));
            }
            let fallback = network.buffers[pos - 1].id;
            tree.replace_buffer(current, fallback);
            network.buffers.remove(pos);
            return;
        }
    }

    /// Send the focused buffer's input line: raw to the server buffer,
    /// as a PRIVMSG elsewhere. The sent text is echoed into the buffer
    /// under the own nick.
    pub fn send_input(&mut self, id: BufferId) {
        for network in &mut self.networks {
            let Some(pos) = network.buffers.iter().position(|b| b.id == id) else {
                continue;
            };
            if network.buffers[pos].input.is_empty() {
                return;
            }
            let line = network.buffers[pos].input.take();

            if network.buffers[pos].kind == BufferKind::Server {
                network.send(&line);
            } else {
                let target = network.buffers[pos].name.clone();
                network.send(&format!("PRIVMSG {target} :{line}"));
            }

            let nick = network.nick.clone();
            network.buffers[pos].push(Message::new(painted(&nick, nick_color(&nick)), line));
            return;
        }
    }

    /// Say goodbye on every live connection.
    pub fn quit(&mut self) {
        for network in &mut self.networks {
            if network.conn.is_some() {
                network.send("QUIT");
            }
        }
    }

    pub fn clear_activity(&mut self, id: BufferId) {
        if let Some(buffer) = self.buffer_mut(id) {
            buffer.clear_activity();
        }
    }

    /// Drain every connection and react to the lines received.
    /// `focused` suppresses activity marks for the buffer on screen.
    pub fn poll(&mut self, focused: BufferId) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        for ni in 0..self.networks.len() {
            let lines = {
                let network = &mut self.networks[ni];
                let Some(conn) = network.conn.as_mut() else {
                    continue;
                };
                match conn.poll_lines() {
                    Ok(lines) => lines,
                    Err(e) => {
                        let fatal = !matches!(e, ConnectionError::Closed);
                        if fatal {
                            error!("read from {} failed: {e}", network.name);
                        } else {
                            info!("{} disconnected", network.name);
                        }
                        network.conn = None;
                        network.buffers[0].push(Message::new(
                            painted("<--", QUIT_COLOR),
                            format!("disconnected: {e}"),
                        ));
                        outcome.dirty = true;
                        continue;
                    }
                }
            };

            for line in lines {
                outcome.dirty = true;
                self.react(ni, &line, focused, &mut outcome);
            }
        }

        outcome
    }

    /// Dispatch one server line into buffer messages.
    fn react(&mut self, ni: usize, line: &str, focused: BufferId, outcome: &mut PollOutcome) {
        let Some(msg) = IrcMessage::parse(line) else {
            return;
        };

        // raw line into the server buffer
        {
            let network = &mut self.networks[ni];
            network.buffers[0].push(Message::new("[server]", line.to_string()));
        }

        let nick = msg.prefix_nick().unwrap_or("").to_string();

        match msg.command.as_str() {
            "PING" => {
                let reply = match msg.params.first() {
                    Some(token) => format!("PONG :{token}"),
                    None => "PONG".to_string(),
                };
                self.networks[ni].send(&reply);
            }

            "PRIVMSG" => {
                let (Some(target), Some(text)) = (msg.params.first(), msg.params.get(1)) else {
                    return;
                };
                self.privmsg(ni, &nick, target, text, focused, outcome);
            }

            "JOIN" => {
                let Some(channel) = msg.params.first() else {
                    return;
                };
                let me = self.networks[ni].nick.clone();
                if nick == me {
                    let id = self.alloc_id();
                    let network = &mut self.networks[ni];
                    network
                        .buffers
                        .push(Buffer::new(id, BufferKind::Channel, channel.clone()));
                    outcome.switch_to = Some(id);
                } else {
                    let prefix = msg.prefix.clone().unwrap_or_default();
                    let network = &mut self.networks[ni];
                    if let Some(buffer) = network.buffer_by_name(channel) {
                        buffer.push(Message::new(
                            painted("-->", JOIN_COLOR),
                            format!(
                                "{} ({prefix}) has joined {channel}",
                                painted(&nick, nick_color(&nick))
                            ),
                        ));
                    }
                }
            }

            "PART" => {
                let Some(channel) = msg.params.first() else {
                    return;
                };
                let me = self.networks[ni].nick.clone();
                if nick != me {
                    let prefix = msg.prefix.clone().unwrap_or_default();
                    let reason = msg.params.get(1).cloned().unwrap_or_default();
                    let network = &mut self.networks[ni];
                    if let Some(buffer) = network.buffer_by_name(channel) {
                        buffer.push(Message::new(
                            painted("<--", QUIT_COLOR),
                            format!(
                                "{} ({prefix}) has left {channel}: {reason}",
                                painted(&nick, nick_color(&nick))
                            ),
                        ));
                    }
                }
            }

            "QUIT" => {
                let reason = msg.params.first().cloned().unwrap_or_default();
                let network = &mut self.networks[ni];
                network.buffers[0].push(Message::new(
                    painted("<--", QUIT_COLOR),
                    format!(
                        "{} has quit ({reason})",
                        painted(&nick, nick_color(&nick))
                    ),
                ));
            }

            "NICK" => {
                let Some(new) = msg.params.first() else {
                    return;
                };
                let network = &mut self.networks[ni];
                if nick == network.nick {
                    network.nick = new.clone();
                    network.mention = mention_regex(new);
                } else {
                    network.buffers[0].push(Message::new(
                        painted("--", MISC_COLOR),
                        format!(
                            "{} is now known as {}",
                            painted(&nick, nick_color(&nick)),
                            painted(new, nick_color(new))
                        ),
                    ));
                }
            }

            _ => {}
        }
    }

    fn privmsg(
        &mut self,
        ni: usize,
        nick: &str,
        target: &str,
        text: &str,
        focused: BufferId,
        outcome: &mut PollOutcome,
    ) {
        let me = self.networks[ni].nick.clone();
        let mentions_me = self.networks[ni]
            .mention
            .as_ref()
            .is_some_and(|re| re.is_match(text));

        // direct messages get their own buffer, created on demand
        let direct = target.eq_ignore_ascii_case(&me);
        let existing = if direct {
            self.networks[ni].buffer_by_name(nick).map(|b| b.id)
        } else {
            self.networks[ni].buffer_by_name(target).map(|b| b.id)
        };
        let buffer_id = match existing {
            Some(id) => id,
            None if direct => {
                let id = self.alloc_id();
                self.networks[ni]
                    .buffers
                    .push(Buffer::new(id, BufferKind::User, nick.to_string()));
                outcome.bell = true;
                id
            }
            // unknown channel; fall back to the server buffer
            None => self.networks[ni].server_buffer_id(),
        };

        let colored_nick = painted(nick, nick_color(nick));
        let mut message = if let Some(action) = text
            .strip_prefix("\u{1}ACTION")
            .map(|rest| rest.trim_end_matches('\u{1}'))
        {
            Message::new(
                painted("*", MISC_COLOR),
                format!("{colored_nick}{action}"),
            )
        } else {
            Message::new(colored_nick, text.to_string())
        };
        message.important = mentions_me;

        let network = &mut self.networks[ni];
        let Some(buffer) = network.buffers.iter_mut().find(|b| b.id == buffer_id) else {
            return;
        };

        if buffer.id != focused {
            buffer.mark(Activity::Normal);
            if direct || message.important {
                buffer.mark(Activity::Important);
                outcome.bell = true;
            }
        }

        buffer.push(message);
    }
}
