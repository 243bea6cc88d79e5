//! IRC wire protocol.
//!
//! A tokenizer for the `:prefix COMMAND params :trailing` line format
//! and a non-blocking TCP connection with `\r\n` line buffering. The
//! connection never blocks the event loop: reads drain whatever the
//! socket has and sends spin briefly on a full buffer.

use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpStream;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("connection closed by server")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

/// One parsed server line. Trailing parameters are folded into
/// `params` as the final element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse a line without its `\r\n` terminator.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_start();

        let prefix = if let Some(tail) = rest.strip_prefix(':') {
            let (prefix, tail) = tail.split_once(' ')?;
            rest = tail.trim_start();
            Some(prefix.to_string())
        } else {
            None
        };

        let mut params = Vec::new();
        let command;
        match rest.split_once(' ') {
            Some((cmd, tail)) => {
                command = cmd.to_uppercase();
                let mut rest = tail.trim_start();
                loop {
                    if rest.is_empty() {
                        break;
                    }
                    if let Some(trailing) = rest.strip_prefix(':') {
                        params.push(trailing.to_string());
                        break;
                    }
                    match rest.split_once(' ') {
                        Some((param, tail)) => {
                            params.push(param.to_string());
                            rest = tail.trim_start();
                        }
                        None => {
                            params.push(rest.to_string());
                            break;
                        }
                    }
                }
            }
            None => {
                if rest.is_empty() {
                    return None;
                }
                command = rest.to_uppercase();
            }
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }

    /// The nick part of the prefix (everything before `!`).
    pub fn prefix_nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split('!').next().unwrap_or(prefix))
    }
}

/// Non-blocking connection to one IRC server.
pub struct Connection {
    stream: TcpStream,
    inbuf: Vec<u8>,
    closed: bool,
}

impl Connection {
    pub fn connect(server: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((server, port))?;
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            inbuf: Vec::new(),
            closed: false,
        })
    }

    /// Send the registration burst.
    pub fn register(&mut self, nick: &str, username: &str, realname: &str) -> Result<()> {
        self.send(&format!("NICK {nick}"))?;
        self.send(&format!("USER {username} 0 * :{realname}"))
    }

    /// Send one line, appending `\r\n`. Short and interrupted writes
    /// are retried until the whole line is out.
    pub fn send(&mut self, line: &str) -> Result<()> {
        debug!(line, "irc send");
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");

        let mut pending = &data[..];
        while !pending.is_empty() {
            match self.stream.write(pending) {
                Ok(0) => return Err(ConnectionError::Closed),
                Ok(n) => pending = &pending[n..],
                Err(e)
                    if e.kind() == ErrorKind::Interrupted || e.kind() == ErrorKind::WouldBlock =>
                {
                    continue
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Drain the socket and return the complete lines received.
    ///
    /// A clean shutdown by the server still yields the lines buffered
    /// before it; the following call reports [`ConnectionError::Closed`].
    pub fn poll_lines(&mut self) -> Result<Vec<String>> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }

        let mut chunk = [0u8; 4096];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.closed = true;
                    break;
                }
                Ok(n) => self.inbuf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let mut lines = Vec::new();
        while let Some(pos) = self.inbuf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.inbuf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.is_empty() {
                lines.push(String::from_utf8_lossy(&line).into_owned());
            }
        }

        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_line() {
        let m = IrcMessage::parse(":nick!user@host PRIVMSG #chan :hello there").unwrap();
        assert_eq!(m.prefix.as_deref(), Some("nick!user@host"));
        assert_eq!(m.command, "PRIVMSG");
        assert_eq!(m.params, vec!["#chan", "hello there"]);
        assert_eq!(m.prefix_nick(), Some("nick"));
    }

    #[test]
    fn parse_without_prefix() {
        let m = IrcMessage::parse("PING :irc.example.net").unwrap();
        assert_eq!(m.prefix, None);
        assert_eq!(m.command, "PING");
        assert_eq!(m.params, vec!["irc.example.net"]);
    }

    #[test]
    fn parse_bare_command() {
        let m = IrcMessage::parse("quit").unwrap();
        assert_eq!(m.command, "QUIT");
        assert!(m.params.is_empty());
    }

    #[test]
    fn parse_numeric_with_many_params() {
        let m = IrcMessage::parse(":server 001 me :Welcome to the network").unwrap();
        assert_eq!(m.command, "001");
        assert_eq!(m.params, vec!["me", "Welcome to the network"]);
    }

    #[test]
    fn parse_trailing_preserves_colons_and_spaces() {
        let m = IrcMessage::parse("PRIVMSG #a :one :two  three").unwrap();
        assert_eq!(m.params, vec!["#a", "one :two  three"]);
    }

    #[test]
    fn parse_empty_line_is_none() {
        assert_eq!(IrcMessage::parse(""), None);
        assert_eq!(IrcMessage::parse("   "), None);
    }

    #[test]
    fn prefix_nick_without_ident() {
        let m = IrcMessage::parse(":irc.example.net NOTICE * :hi").unwrap();
        assert_eq!(m.prefix_nick(), Some("irc.example.net"));
    }
}
