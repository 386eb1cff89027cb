use log::debug;
use mailin_embedded::{response, Handler, Response, Server, SslConfig};
use std::{net::IpAddr, time::Duration};
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        Mutex,
    },
    time::timeout,
};

pub const SMTP_PORT: u16 = 4567;
pub const POISONED_SMTP_PORT: u16 = 4568;

/// One mail as the relay saw it: the envelope plus the raw message, headers included.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReceivedMail {
    pub envelope_from: String,
    pub recipients: Vec<String>,
    pub content: String,
}

#[derive(Clone)]
struct RecordingHandler {
    in_progress: ReceivedMail,
    outbox: UnboundedSender<ReceivedMail>,
}

impl Handler for RecordingHandler {
    fn data_start(
        &mut self,
        _domain: &str,
        from: &str,
        _is8bit: bool,
        to: &[String],
    ) -> Response {
        self.in_progress = ReceivedMail {
            envelope_from: from.into(),
            recipients: to.to_vec(),
            content: String::new(),
        };
        response::OK
    }

    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.in_progress
            .content
            .push_str(&String::from_utf8_lossy(buf));
        Ok(())
    }

    fn data_end(&mut self) -> Response {
        let mail = std::mem::take(&mut self.in_progress);
        debug!(
            "Relay received mail from {} to {:?}",
            mail.envelope_from, mail.recipients
        );
        let _ = self.outbox.send(mail);
        response::OK
    }

    fn auth_plain(
        &mut self,
        _authorization_id: &str,
        authentication_id: &str,
        _password: &str,
    ) -> Response {
        debug!("Relay accepted credentials for {authentication_id}");
        response::AUTH_OK
    }
}

/// Refuses every conversation, so that any send through it fails.
#[derive(Clone)]
struct RefusingHandler;

impl Handler for RefusingHandler {
    fn helo(&mut self, _ip: IpAddr, _domain: &str) -> Response {
        response::INTERNAL_ERROR
    }

    fn mail(&mut self, _ip: IpAddr, _domain: &str, _from: &str) -> Response {
        response::INTERNAL_ERROR
    }
}

fn relay_on<H: Handler + Clone + Send + 'static>(handler: H, port: u16) -> Server<H> {
    let mut server = Server::new(handler);
    server
        .with_name("contact-form-relay.test")
        .with_ssl(SslConfig::None)
        .unwrap()
        .with_addr(format!("127.0.0.1:{port}"))
        .unwrap();
    server
}

/// An SMTP relay on [`SMTP_PORT`] which accepts everything and queues each mail for
/// [`FakeSmtpServer::next_mail`]. Nothing is dropped, so tests read mails in sending order.
pub struct FakeSmtpServer {
    pending: std::sync::Mutex<Option<Server<RecordingHandler>>>,
    inbox: Mutex<UnboundedReceiver<ReceivedMail>>,
}

impl FakeSmtpServer {
    pub fn new() -> Self {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let handler = RecordingHandler {
            in_progress: ReceivedMail::default(),
            outbox,
        };
        Self {
            pending: std::sync::Mutex::new(Some(relay_on(handler, SMTP_PORT))),
            inbox: Mutex::new(inbox),
        }
    }

    /// Starts serving on a background thread. Only the first call has any effect.
    pub fn start(&self) {
        if let Some(server) = self.pending.lock().unwrap().take() {
            std::thread::spawn(move || {
                let _ = server.serve();
            });
        }
    }

    pub async fn next_mail(&self) -> Option<ReceivedMail> {
        self.inbox.lock().await.recv().await
    }

    /// Discards mail left over from earlier tests.
    pub async fn flush(&self) {
        let mut inbox = self.inbox.lock().await;
        while let Ok(Some(_)) = timeout(Duration::from_millis(100), inbox.recv()).await {}
    }

    pub fn smtp_url() -> String {
        format!("smtp://localhost:{SMTP_PORT}")
    }
}

impl Default for FakeSmtpServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts a relay on [`POISONED_SMTP_PORT`] which refuses every conversation.
pub fn start_poisoned_smtp_server() {
    let server = relay_on(RefusingHandler, POISONED_SMTP_PORT);
    std::thread::spawn(move || {
        let _ = server.serve();
    });
    std::thread::sleep(Duration::from_millis(100));
}
