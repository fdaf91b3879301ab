#![allow(dead_code, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use futures::{channel::mpsc, StreamExt};

use assh_kex::{
    side::{
        client::{self, Client},
        server::{self, Server},
    },
    Error, Pipe, Result, Session, Transport,
};

/// The transports installed on one end of a [`Duplex`].
#[derive(Debug, Default)]
pub struct Installed {
    pub tx: Option<Transport>,
    pub rx: Option<Transport>,
}

/// One end of an in-memory pipe, recording what went through it.
pub struct Duplex {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,

    /// Message numbers of the sent payloads.
    pub sent: Arc<Mutex<Vec<u8>>>,

    /// Transports installed by the key-exchanges.
    pub installed: Arc<Mutex<Installed>>,
}

impl Pipe for Duplex {
    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.sent.lock().unwrap().push(payload[0]);

        self.tx
            .unbounded_send(payload.to_vec())
            .map_err(|_| Error::Disconnected)
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        self.rx.next().await.ok_or(Error::Disconnected)
    }

    fn install_tx(&mut self, transport: Transport) {
        self.installed.lock().unwrap().tx = Some(transport);
    }

    fn install_rx(&mut self, transport: Transport) {
        self.installed.lock().unwrap().rx = Some(transport);
    }
}

pub fn pair() -> (Duplex, Duplex) {
    let (atx, brx) = mpsc::unbounded();
    let (btx, arx) = mpsc::unbounded();

    (
        Duplex {
            tx: atx,
            rx: arx,
            sent: Default::default(),
            installed: Default::default(),
        },
        Duplex {
            tx: btx,
            rx: brx,
            sent: Default::default(),
            installed: Default::default(),
        },
    )
}

pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}

pub fn host_key() -> ssh_key::PrivateKey {
    ssh_key::PrivateKey::random(&mut rand::thread_rng(), ssh_key::Algorithm::Ed25519).unwrap()
}

pub fn server(kex: &str) -> Server {
    Server {
        keys: vec![host_key()],
        algorithms: server::Algorithms {
            kexs: vec![kex.parse().unwrap()],
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn client(kex: &str) -> Client {
    Client {
        algorithms: client::Algorithms {
            kexs: vec![kex.parse().unwrap()],
            ..Default::default()
        },
        ..Default::default()
    }
}

pub struct Peers {
    pub client: Session<Duplex, Client>,
    pub server: Session<Duplex, Server>,

    pub client_sent: Arc<Mutex<Vec<u8>>>,
    pub client_installed: Arc<Mutex<Installed>>,
    pub server_installed: Arc<Mutex<Installed>>,
}

/// Connect a client and a server session over a [`Duplex`].
pub fn connect(client: Client, server: Server) -> Peers {
    let (a, b) = pair();

    let (client_sent, client_installed) = (a.sent.clone(), a.installed.clone());
    let server_installed = b.installed.clone();

    let (client_id, server_id) = (client.id.clone(), server.id.clone());

    Peers {
        client: Session::new(a, client, server_id),
        server: Session::new(b, server, client_id),
        client_sent,
        client_installed,
        server_installed,
    }
}
