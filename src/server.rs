//! The event loop.
//!
//! One thread owns the listener, every connection, the key space and the
//! TTL heap. Each tick waits for readiness (or the nearest timer), drives
//! the ready connections, reaps idle peers, expires due TTLs under a work
//! budget, and accepts new connections until accept would block.

use crate::config::Config;
use crate::connection::{ConnState, Connection};
use crate::error::ZedisResult;
use crate::pool::ThreadPool;
use crate::store::entry::{self, mono_now_us};
use crate::store::Store;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const LISTENER: Token = Token(0);
/// Entries expired per tick, at most.
const MAX_TTL_PER_TICK: usize = 2000;
/// Poll timeout when no timer is pending.
const MAX_POLL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

pub struct Server {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    store: Store,
    pool: ThreadPool,
    config: Config,
    stop: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listener and set up the loop. The listener is nonblocking
    /// with SO_REUSEADDR, per mio's TcpListener.
    pub fn bind(config: Config) -> ZedisResult<Self> {
        let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
            .parse()
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidInput, e))?;
        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        info!("listening on {}", listener.local_addr()?);
        Ok(Server {
            poll,
            listener,
            connections: HashMap::new(),
            next_token: 1,
            store: Store::new(),
            pool: ThreadPool::new(config.workers),
            config,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The flag a signal handler sets to request a graceful stop.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// The bound address, useful when the configured port was 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn run(&mut self) -> ZedisResult<()> {
        let mut events = Events::with_capacity(1024);
        while !self.stop.load(Ordering::Relaxed) {
            let timeout = self.next_timeout();
            match self.poll.poll(&mut events, Some(timeout)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            let mut accept_ready = false;
            for event in events.iter() {
                if event.token() == LISTENER {
                    accept_ready = true;
                } else {
                    self.drive_connection(event.token());
                }
            }
            self.reap_idle();
            self.expire_ttls();
            if accept_ready {
                self.accept_loop()?;
            }
        }
        info!("stop requested, shutting down");
        self.connections.clear();
        self.pool.join();
        Ok(())
    }

    /// Sleep until the nearest of: the oldest connection going idle, the
    /// next TTL deadline, or the 24h cap.
    fn next_timeout(&self) -> Duration {
        let mut timeout = MAX_POLL_TIMEOUT;

        if let Some(oldest) = self.connections.values().map(|c| c.last_activity).min() {
            let budget = Duration::from_millis(self.config.idle_timeout_ms);
            let deadline = oldest + budget;
            timeout = timeout.min(deadline.saturating_duration_since(Instant::now()));
        }

        if let Some(expires_at) = self.store.next_expiry() {
            let remaining_us = expires_at.saturating_sub(mono_now_us());
            timeout = timeout.min(Duration::from_micros(remaining_us));
        }

        timeout
    }

    fn drive_connection(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        match conn.drive(&mut self.store, &self.pool) {
            Ok(()) if conn.state() == ConnState::End => {
                debug!("connection finished");
                self.close_connection(token);
            }
            Ok(()) => {
                let interest = conn.interest();
                if let Err(e) = self
                    .poll
                    .registry()
                    .reregister(conn.stream_mut(), token, interest)
                {
                    warn!("reregister failed: {e}");
                    self.close_connection(token);
                }
            }
            Err(e) => {
                debug!("closing connection: {e}");
                self.close_connection(token);
            }
        }
    }

    fn close_connection(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(conn.stream_mut());
        }
    }

    /// Close connections whose last activity is older than the idle
    /// budget, least-recently-active first.
    fn reap_idle(&mut self) {
        let budget = Duration::from_millis(self.config.idle_timeout_ms);
        loop {
            let now = Instant::now();
            let stale = self
                .connections
                .iter()
                .min_by_key(|(_, conn)| conn.last_activity)
                .filter(|(_, conn)| now.duration_since(conn.last_activity) >= budget)
                .map(|(token, _)| *token);
            match stale {
                Some(token) => {
                    debug!("closing idle connection");
                    self.close_connection(token);
                }
                None => break,
            }
        }
    }

    fn expire_ttls(&mut self) {
        let expired = self.store.expire_cycle(mono_now_us(), MAX_TTL_PER_TICK);
        if !expired.is_empty() {
            debug!("expired {} entries", expired.len());
        }
        for removed in expired {
            entry::dispose(removed, &self.pool);
        }
    }

    fn accept_loop(&mut self) -> ZedisResult<()> {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        warn!("failed to register connection from {peer}: {e}");
                        continue;
                    }
                    debug!("new connection from {peer}");
                    self.connections.insert(token, Connection::new(stream));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
