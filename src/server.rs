use crate::aof::{Aof, AofFlusher, AofMode};
use crate::network::{ConnState, Connection};
use crate::protocol::CommandExecutor;
use crate::storage::Database;
use crate::{config::Config, error::Result};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const SERVER: Token = Token(0);

/// Cloneable handle that asks a running [`Server`] to stop
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Signal the server to shut down gracefully
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Single-threaded key-value server
///
/// One `mio` loop owns the listener, every client connection and the
/// [`Database`]. The only other thread is the AOF flusher.
pub struct Server {
    config: Config,
    listener: TcpListener,
    db: Database,
    executor: CommandExecutor,
    aof: Option<Arc<Aof>>,
    flusher: Option<AofFlusher>,
    shutdown: ShutdownHandle,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the listener and rebuild the key space from the AOF.
    ///
    /// Any failure to open or replay the AOF is returned; the server never
    /// starts with partially restored data.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let std_listener = std::net::TcpListener::bind(config.listen_addr())?;
        std_listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(std_listener);

        let mut db = Database::with_capacity(config.initial_table_capacity);

        let (aof, executor) = if config.aof_enabled {
            let aof = Arc::new(Aof::open(&config.aof_path, config.aof_flush_interval())?);
            let executor = CommandExecutor::with_aof(Arc::clone(&aof));
            aof.replay(&mut db, &executor)?;
            aof.set_mode(AofMode::Append)?;
            (Some(aof), executor)
        } else {
            info!("AOF disabled, running memory-only");
            (None, CommandExecutor::new())
        };

        let flusher = aof
            .as_ref()
            .map(|aof| AofFlusher::spawn(Arc::clone(aof)))
            .transpose()?;

        Ok(Self {
            config,
            listener,
            db,
            executor,
            aof,
            flusher,
            shutdown: ShutdownHandle {
                flag: Arc::new(AtomicBool::new(false)),
            },
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound; differs from the config when port 0 was asked for
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the server to shut down gracefully
    pub fn shutdown(&self) {
        info!("Initiating server shutdown");
        self.shutdown.shutdown();
    }

    /// Get the number of active client connections
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Shared counter behind [`Server::active_connections`], readable while `run` blocks
    pub fn connection_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.active_connections)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Serve until [`ShutdownHandle::shutdown`] is called.
    ///
    /// On return every connection is dropped and the AOF is flushed and
    /// closed.
    pub fn run(&mut self) -> Result<()> {
        let mut poll = Poll::new()?;
        let mut events = Events::with_capacity(1024);

        poll.registry()
            .register(&mut self.listener, SERVER, Interest::READABLE)?;

        // Connection tracking
        let mut connections: HashMap<Token, (TcpStream, Connection)> = HashMap::new();
        let mut next_token = 1usize;

        info!("Server listening on {}", self.local_addr()?);

        // Event loop
        while !self.shutdown.is_shutdown() {
            if let Err(e) = poll.poll(&mut events, Some(self.config.poll_timeout())) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            for event in events.iter() {
                match event.token() {
                    SERVER => self.accept_connections(&poll, &mut connections, &mut next_token),
                    token => {
                        let done = match connections.get_mut(&token) {
                            Some((stream, connection)) => {
                                connection.drive(stream, &mut self.db, &self.executor)
                                    == ConnState::Done
                            }
                            None => false,
                        };

                        if done {
                            if let Some((mut stream, connection)) = connections.remove(&token) {
                                let _ = poll.registry().deregister(&mut stream);
                                debug!(
                                    "Connection {} from {:?} closed after {} commands",
                                    connection.connection_id,
                                    connection.client_addr,
                                    connection.commands_processed
                                );
                                self.active_connections.fetch_sub(1, Ordering::AcqRel);
                            }
                        }
                    }
                }
            }
        }

        // Cleanup
        for (_, (mut stream, _)) in connections.drain() {
            let _ = poll.registry().deregister(&mut stream);
            self.active_connections.fetch_sub(1, Ordering::AcqRel);
        }

        self.stop_persistence();
        info!(
            "Server shutting down ({} commands processed)",
            self.executor.commands_processed()
        );
        Ok(())
    }

    fn accept_connections(
        &self,
        poll: &Poll,
        connections: &mut HashMap<Token, (TcpStream, Connection)>,
        next_token: &mut usize,
    ) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    if connections.len() >= self.config.max_clients {
                        warn!(
                            "Rejecting connection from {}: {} clients already connected",
                            addr,
                            connections.len()
                        );
                        continue;
                    }

                    // Configure socket
                    if let Err(e) = stream.set_nodelay(self.config.tcp_nodelay) {
                        debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                    }

                    let token = Token(*next_token);
                    *next_token += 1;

                    // Edge-triggered: both directions are drained on every event
                    if let Err(e) = poll.registry().register(
                        &mut stream,
                        token,
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        error!("Failed to register connection from {}: {}", addr, e);
                        continue;
                    }

                    let connection = Connection::new(self.config.max_message_size, Some(addr));
                    debug!("New connection {} from {}", connection.connection_id, addr);

                    connections.insert(token, (stream, connection));
                    self.active_connections.fetch_add(1, Ordering::AcqRel);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    break;
                }
            }
        }
    }

    fn stop_persistence(&mut self) {
        if let Some(flusher) = self.flusher.take() {
            flusher.stop();
        }
        if let Some(aof) = &self.aof {
            match aof.close() {
                Ok(()) => info!("AOF {} flushed and closed", aof.path().display()),
                Err(e) => error!("Failed to close AOF {}: {}", aof.path().display(), e),
            }
        }
    }
}
