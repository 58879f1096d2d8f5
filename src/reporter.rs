// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The MQTT side of the version reporter.
//!
//! Everything runs on the caller's thread: we drive the `rumqttc` connection
//! iterator ourselves and answer queries inline, so the version bundle is
//! only ever read and needs no locking.

use crate::args::{Auth, ConnectionSettings, Mode};
use crate::error::{Error, Result};
use crate::version::VersionBundle;
use rumqttc::{Client, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use std::path::Path;
use std::time::{Duration, Instant};

/// Where version queries arrive.
pub const SUBSCRIBE_TOPIC: &str = "pub/device/version";
/// Where the status bundle goes.
pub const PUBLISH_TOPIC: &str = "sub/avg/version";
/// The only payload that gets an answer.
pub const VERSION_QUERY: &[u8] = b"2";

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 10;
/// ALPN protocol AWS IoT wants for X.509 auth on port 443.
const AWS_MQTT_ALPN: &[u8] = b"x-amzn-mqtt-ca";

/// Outbound half of an MQTT session.
pub trait Publisher {
    fn send(&mut self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

impl Publisher for Client {
    fn send(&mut self, topic: &str, payload: Vec<u8>) -> Result<()> {
        // Never block: we're the thread that drains the request queue.
        self.try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| Error::Publish(e.to_string()))
    }
}

/// Answers version queries from a fixed snapshot.
#[derive(Debug)]
pub struct Responder {
    bundle: VersionBundle,
}

impl Responder {
    pub fn new(bundle: VersionBundle) -> Self {
        Responder { bundle }
    }

    /// Handles one inbound message. Returns whether a status was published.
    pub fn handle(&self, topic: &str, payload: &[u8], out: &mut dyn Publisher) -> Result<bool> {
        log::info!(
            "received on {topic}: {}",
            String::from_utf8_lossy(payload)
        );
        if topic != SUBSCRIBE_TOPIC || payload != VERSION_QUERY {
            log::debug!("not a version query, ignoring");
            return Ok(false);
        }

        let json = self.bundle.to_json()?;
        out.send(PUBLISH_TOPIC, json.into_bytes())?;
        log::info!("published status for {}", self.bundle.eui64);
        Ok(true)
    }
}

/// One-off message sent after the first successful connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub topic: String,
    pub message: String,
}

/// Exponential reconnect delay, reset once a connection has stayed up long
/// enough to count as stable.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    max: Duration,
    stable_after: Duration,
    next: Duration,
    connected_at: Option<Instant>,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_secs(32),
            Duration::from_secs(20),
        )
    }
}

impl ReconnectBackoff {
    pub fn new(base: Duration, max: Duration, stable_after: Duration) -> Self {
        ReconnectBackoff {
            base,
            max,
            stable_after,
            next: base,
            connected_at: None,
        }
    }

    pub fn connected(&mut self, now: Instant) {
        self.connected_at = Some(now);
    }

    /// Records a failure and returns how long to wait before retrying.
    pub fn failed(&mut self, now: Instant) -> Duration {
        if let Some(since) = self.connected_at.take() {
            if now.saturating_duration_since(since) >= self.stable_after {
                self.next = self.base;
            }
        }
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }
}

/// Translates validated settings into client options, loading the
/// credential files.
pub fn mqtt_options(settings: &ConnectionSettings) -> Result<MqttOptions> {
    let ca = read_credential(&settings.root_ca)?;

    let (host, transport) = match &settings.auth {
        Auth::Certificate { cert, key } => {
            let client_auth = Some((read_credential(cert)?, read_credential(key)?));
            let alpn = (settings.port == 443).then(|| vec![AWS_MQTT_ALPN.to_vec()]);
            let tls = TlsConfiguration::Simple {
                ca,
                alpn,
                client_auth,
            };
            (settings.endpoint.clone(), Transport::Tls(tls))
        }
        Auth::WebSocket => {
            let tls = TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth: None,
            };
            (websocket_url(settings), Transport::Wss(tls))
        }
    };

    let mut options = MqttOptions::new(settings.client_id.clone(), host, settings.port);
    options.set_keep_alive(KEEP_ALIVE).set_transport(transport);
    Ok(options)
}

/// A credential file we can't load counts as a connection failure.
fn read_credential(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::Connection(format!("reading {}: {e}", path.display())))
}

fn websocket_url(settings: &ConnectionSettings) -> String {
    format!("wss://{}:{}/mqtt", settings.endpoint, settings.port)
}

/// Connects and serves version queries until the connection iterator ends.
///
/// Any error before the first CONNACK is a [`Error::Connection`]; after that
/// the client reconnects on its own and we just pace it.
pub fn run(
    settings: &ConnectionSettings,
    mode: Mode,
    announce: Option<Announcement>,
    responder: &Responder,
) -> Result<()> {
    let options = mqtt_options(settings)?;
    let (mut client, mut connection) = Client::new(options, REQUEST_CAPACITY);
    let mut backoff = ReconnectBackoff::default();
    let mut connected_once = false;

    log::info!(
        "connecting to {}:{} as {}",
        settings.endpoint,
        settings.port,
        settings.client_id
    );

    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                log::info!("connected");
                backoff.connected(Instant::now());
                // Clean sessions drop subscriptions, so renew on every connect.
                if mode.subscribes() {
                    client
                        .try_subscribe(SUBSCRIBE_TOPIC, QoS::AtMostOnce)
                        .map_err(|e| Error::Connection(e.to_string()))?;
                    log::info!("subscribed to {SUBSCRIBE_TOPIC}");
                }
                if !connected_once {
                    if let Some(a) = &announce {
                        client.send(&a.topic, a.message.clone().into_bytes())?;
                    }
                }
                connected_once = true;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if let Err(e) = responder.handle(&publish.topic, &publish.payload, &mut client) {
                    log::warn!("answering query: {e}");
                }
            }
            Ok(event) => log::trace!("{event:?}"),
            Err(e) if !connected_once => return Err(Error::Connection(e.to_string())),
            Err(e) => {
                let delay = backoff.failed(Instant::now());
                log::warn!("connection lost ({e}), retrying in {delay:?}");
                std::thread::sleep(delay);
            }
        }
    }

    Ok(())
}
