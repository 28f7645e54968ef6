//! Per-connection state machine.
//!
//! A connection is either reading requests, draining its write buffer, or
//! finished. All I/O is nonblocking: a would-block simply returns control
//! to the event loop, and `last_activity` is refreshed on every drive so
//! the idle reaper can find stale peers.

use crate::command;
use crate::error::ZedisResult;
use crate::pool::ThreadPool;
use crate::protocol;
use crate::store::Store;
use bytes::BytesMut;
use mio::net::TcpStream;
use mio::Interest;
use std::io::{ErrorKind, Read, Write};
use std::time::Instant;

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Reading and executing request frames.
    Request,
    /// Draining the write buffer.
    Response,
    /// Finished; the event loop closes it on the next pass.
    End,
}

pub struct Connection {
    stream: TcpStream,
    state: ConnState,
    rbuf: BytesMut,
    wbuf: BytesMut,
    wbuf_sent: usize,
    pub last_activity: Instant,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream,
            state: ConnState::Request,
            rbuf: BytesMut::with_capacity(READ_CHUNK),
            wbuf: BytesMut::with_capacity(READ_CHUNK),
            wbuf_sent: 0,
            last_activity: Instant::now(),
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// The poll interest matching the current state.
    pub fn interest(&self) -> Interest {
        match self.state {
            ConnState::Response => Interest::WRITABLE,
            _ => Interest::READABLE,
        }
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Advance the state machine as far as the socket allows. An `Err`
    /// means the connection is unusable and must be closed.
    pub fn drive(&mut self, store: &mut Store, pool: &ThreadPool) -> ZedisResult<()> {
        self.last_activity = Instant::now();
        if self.state == ConnState::Request {
            self.handle_request(store, pool)?;
        }
        if self.state == ConnState::Response {
            self.handle_response()?;
        }
        Ok(())
    }

    /// Read until would-block, executing every complete frame as it lands
    /// and queueing the framed replies in order.
    fn handle_request(&mut self, store: &mut Store, pool: &ThreadPool) -> ZedisResult<()> {
        loop {
            let progress = self.fill_read_buffer()?;
            loop {
                match protocol::parse_request(&mut self.rbuf) {
                    Ok(Some(args)) => {
                        let reply = command::dispatch(&args, store, pool);
                        protocol::write_response(&mut self.wbuf, &reply);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        self.state = ConnState::End;
                        return Err(e);
                    }
                }
            }
            if !progress {
                break;
            }
        }
        if !self.wbuf.is_empty() && self.state != ConnState::End {
            self.state = ConnState::Response;
        }
        Ok(())
    }

    /// One nonblocking read. Returns whether bytes arrived; EOF moves the
    /// connection to End.
    fn fill_read_buffer(&mut self) -> ZedisResult<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.state = ConnState::End;
                    return Ok(false);
                }
                Ok(n) => {
                    self.rbuf.extend_from_slice(&chunk[..n]);
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.state = ConnState::End;
                    return Err(e.into());
                }
            }
        }
    }

    /// Drain the write buffer; on a full drain the connection goes back to
    /// reading requests.
    fn handle_response(&mut self) -> ZedisResult<()> {
        while self.wbuf_sent < self.wbuf.len() {
            match self.stream.write(&self.wbuf[self.wbuf_sent..]) {
                Ok(0) => {
                    self.state = ConnState::End;
                    return Err(std::io::Error::from(ErrorKind::WriteZero).into());
                }
                Ok(n) => self.wbuf_sent += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.state = ConnState::End;
                    return Err(e.into());
                }
            }
        }
        self.wbuf.clear();
        self.wbuf_sent = 0;
        self.state = ConnState::Request;
        Ok(())
    }
}
