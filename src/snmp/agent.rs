//! SNMP Agent
//!
//! A read-only SNMPv1/v2c agent over the shared [`MibRegistry`]. Message
//! encoding and decoding is done by `async-snmp`; this module only decides
//! what to answer.
//!
//! # Request Handling
//!
//! Every datagram is handled on its own:
//!
//! ```text
//! Receive → Decode → ValidateCommunity → {Get | GetNext | other} → Encode → Send
//! ```
//!
//! - **GetNext**: each binding is answered with its successor. Past the end of
//!   the MIB the binding is marked `endOfMibView` (v2c) or `noSuchName` (v1);
//!   the remaining bindings are still answered.
//! - **Get**: bindings are answered in order until the first unknown OID, which
//!   is marked `noSuchInstance` (v2c) or `noSuchName` (v1). Bindings after it
//!   are not processed.
//! - **Set / GetBulk / Inform**: `genErr` at index 1, echoing the request's
//!   OIDs with NULL values. A request without bindings cannot carry an error
//!   index and is dropped.
//! - Responses, traps, reports, undecodable datagrams and wrong communities
//!   get no reply at all.
//!
//! # Transports
//!
//! One IPv4 socket is always bound. An IPv6 socket on the same port is
//! optional and bound v6-only so it never collides with the IPv4 wildcard;
//! failing to bind it is logged and the agent stays IPv4-only. Both are served
//! from a single task, one datagram at a time.

use crate::config::SnmpConfig;
use crate::error::{ExporterError, Result};
use crate::metrics::MetricsCollector;
use crate::mib::{MibRegistry, Oid, SharedMib};
use async_snmp::message::CommunityMessage;
use async_snmp::{
    CommunityVersion, DecodeConfig, ErrorIndex, OutboundErrorStatus, Pdu, PduType, ResponsePdu,
    Value, VarBind, Version,
};
use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use subtle::ConstantTimeEq;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const MAX_DATAGRAM: usize = 65535;

/// Turns request datagrams into response datagrams.
#[derive(Clone)]
pub struct Responder {
    community: SecretString,
    registry: SharedMib,
    metrics: Option<MetricsCollector>,
}

impl Responder {
    pub fn new(community: SecretString, registry: SharedMib) -> Self {
        Self {
            community,
            registry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Compares the received community against the configured one, trimmed.
    pub fn community_matches(&self, received: &[u8]) -> bool {
        let expected = self.community.expose_secret().trim().as_bytes();
        expected.len() == received.len() && bool::from(expected.ct_eq(received))
    }

    /// Handle one datagram; `None` means nothing is sent back.
    pub async fn respond(&self, datagram: &[u8], source: SocketAddr) -> Option<Vec<u8>> {
        let request = match CommunityMessage::decode(
            Bytes::copy_from_slice(datagram),
            DecodeConfig::default(),
        ) {
            Ok(outcome) => outcome.value,
            Err(e) => {
                debug!("Undecodable datagram from {}: {}", source, e);
                if let Some(metrics) = &self.metrics {
                    metrics.snmp_decode_errors_total.inc();
                }
                return None;
            }
        };

        let community = request.community().as_bytes();
        if !self.community_matches(community) {
            warn!(
                "Invalid community string <{}> from {}",
                String::from_utf8_lossy(community),
                source
            );
            if let Some(metrics) = &self.metrics {
                metrics.snmp_community_rejects_total.inc();
            }
            return None;
        }

        if let Some(metrics) = &self.metrics {
            metrics
                .snmp_requests_total
                .with_label_values(&[pdu_label(request.pdu().pdu_type())])
                .inc();
        }

        let response = {
            let registry = self.registry.read().await;
            answer(&registry, &request)?
        };
        match response.encode() {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!("Cannot encode SNMP response for {}: {}", source, e);
                None
            }
        }
    }
}

/// Metric label for a PDU type.
fn pdu_label(kind: PduType) -> &'static str {
    match kind {
        PduType::GetRequest => "get",
        PduType::GetNextRequest => "getnext",
        PduType::Response => "response",
        PduType::SetRequest => "set",
        PduType::TrapV1 => "trap",
        PduType::GetBulkRequest => "getbulk",
        PduType::InformRequest => "inform",
        PduType::TrapV2 => "trap2",
        PduType::Report => "report",
    }
}

/// Build the response to an authenticated request.
pub fn answer(registry: &MibRegistry, request: &CommunityMessage) -> Option<CommunityMessage> {
    let Some(pdu) = request.pdu().standard() else {
        debug!("Ignoring SNMPv1 trap");
        return None;
    };
    let version = request.version();

    let response = match pdu.pdu_type() {
        PduType::GetNextRequest => get_next(registry, version, pdu),
        PduType::GetRequest => get(registry, version, pdu),
        PduType::SetRequest | PduType::GetBulkRequest | PduType::InformRequest => {
            debug!("Unsupported request type {}", pdu.pdu_type());
            gen_err(version, pdu)
        }
        other => {
            debug!("Ignoring {} PDU", other);
            return None;
        }
    };

    let community_version = match version {
        Version::V1 => CommunityVersion::V1,
        _ => CommunityVersion::V2c,
    };
    match response.and_then(|response| {
        CommunityMessage::new(community_version, request.community().clone(), response)
    }) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(
                "Cannot build response to request {}: {}",
                pdu.request_id(),
                e
            );
            None
        }
    }
}

fn get_next(
    registry: &MibRegistry,
    version: Version,
    request: &Pdu,
) -> async_snmp::Result<ResponsePdu> {
    let mut varbinds = Vec::with_capacity(request.varbinds().len());
    let mut failed = None;
    for (position, binding) in request.varbinds().iter().enumerate() {
        match registry.get_next(&Oid::from(&binding.oid)) {
            Some(entry) => {
                varbinds.push(VarBind::new(entry.oid.to_wire(), registry.wire_value(entry)));
            }
            None if version == Version::V1 => {
                varbinds.push(VarBind::null(binding.oid.clone()));
                failed.get_or_insert(position);
            }
            None => varbinds.push(VarBind::new(binding.oid.clone(), Value::EndOfMibView)),
        }
    }
    response(version, request.request_id(), varbinds, failed)
}

fn get(registry: &MibRegistry, version: Version, request: &Pdu) -> async_snmp::Result<ResponsePdu> {
    let mut varbinds = Vec::with_capacity(request.varbinds().len());
    let mut failed = None;
    for (position, binding) in request.varbinds().iter().enumerate() {
        match registry.get(&Oid::from(&binding.oid)) {
            Some(entry) => {
                varbinds.push(VarBind::new(entry.oid.to_wire(), registry.wire_value(entry)));
            }
            None => {
                debug!("No such instance: {}", binding.oid);
                if version == Version::V1 {
                    varbinds.push(VarBind::null(binding.oid.clone()));
                    failed = Some(position);
                } else {
                    varbinds.push(VarBind::new(binding.oid.clone(), Value::NoSuchInstance));
                }
                break;
            }
        }
    }
    response(version, request.request_id(), varbinds, failed)
}

/// v1 has no per-binding exceptions; the first failing binding is reported
/// through the PDU's error fields.
fn response(
    version: Version,
    request_id: i32,
    varbinds: Vec<VarBind>,
    failed: Option<usize>,
) -> async_snmp::Result<ResponsePdu> {
    match failed {
        None => ResponsePdu::success(version, request_id, varbinds),
        Some(position) => {
            let index = ErrorIndex::new(position as u32 + 1, varbinds.len())?;
            ResponsePdu::new(
                version,
                request_id,
                OutboundErrorStatus::NoSuchName,
                Some(index),
                varbinds,
            )
        }
    }
}

fn gen_err(version: Version, request: &Pdu) -> async_snmp::Result<ResponsePdu> {
    let varbinds: Vec<VarBind> = request
        .varbinds()
        .iter()
        .map(|binding| VarBind::null(binding.oid.clone()))
        .collect();
    let index = ErrorIndex::new(1, varbinds.len())?;
    ResponsePdu::new(
        version,
        request.request_id(),
        OutboundErrorStatus::GenErr,
        Some(index),
        varbinds,
    )
}

/// Stops a running [`SnmpAgent`].
#[derive(Clone)]
pub struct AgentHandle {
    stop: watch::Sender<bool>,
}

impl AgentHandle {
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

pub struct SnmpAgent {
    responder: Responder,
    v4: UdpSocket,
    v6: Option<UdpSocket>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl SnmpAgent {
    /// Bind `0.0.0.0:<port>` and, when enabled, `[::]:<port>`.
    pub async fn bind(config: &SnmpConfig, responder: Responder) -> Result<Self> {
        let v4 = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
        let v6 = config
            .ipv6
            .then(|| SocketAddr::from((Ipv6Addr::UNSPECIFIED, config.port)));
        Self::bind_to(v4, v6, responder).await
    }

    /// A `v6_addr` with port 0 takes the port the IPv4 socket ended up on.
    pub async fn bind_to(
        v4_addr: SocketAddr,
        v6_addr: Option<SocketAddr>,
        responder: Responder,
    ) -> Result<Self> {
        let v4 = UdpSocket::bind(v4_addr).await.map_err(|e| {
            ExporterError::Transport(format!("cannot bind SNMP socket {}: {}", v4_addr, e))
        })?;
        let v4_local = v4.local_addr()?;
        info!("SNMP agent listening on {}", v4_local);

        let v6 = match v6_addr {
            Some(mut addr) => {
                if addr.port() == 0 {
                    addr.set_port(v4_local.port());
                }
                match bind_v6_only(addr) {
                    Ok(socket) => {
                        info!("SNMP agent listening on {}", socket.local_addr()?);
                        Some(socket)
                    }
                    Err(e) => {
                        warn!("IPv6 SNMP transport unavailable on {}: {}", addr, e);
                        None
                    }
                }
            }
            None => None,
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        Ok(Self {
            responder,
            v4,
            v6,
            stop_tx,
            stop_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.v4.local_addr()?)
    }

    pub fn local_addr_v6(&self) -> Option<SocketAddr> {
        self.v6.as_ref().and_then(|socket| socket.local_addr().ok())
    }

    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            stop: self.stop_tx.clone(),
        }
    }

    /// Serve until stopped. A receive failure is fatal and closes both sockets.
    pub async fn run(mut self) -> Result<()> {
        let mut buf4 = vec![0u8; MAX_DATAGRAM];
        let mut buf6 = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                _ = self.stop_rx.changed() => {
                    info!("SNMP agent stopping");
                    return Ok(());
                }
                received = self.v4.recv_from(&mut buf4) => {
                    let (len, source) = received.map_err(|e| {
                        ExporterError::Transport(format!("IPv4 receive failed: {}", e))
                    })?;
                    Self::reply(&self.responder, &self.v4, &buf4[..len], source).await;
                }
                received = recv_optional(self.v6.as_ref(), &mut buf6) => {
                    let (len, source) = received.map_err(|e| {
                        ExporterError::Transport(format!("IPv6 receive failed: {}", e))
                    })?;
                    if let Some(socket) = &self.v6 {
                        Self::reply(&self.responder, socket, &buf6[..len], source).await;
                    }
                }
            }
        }
    }

    async fn reply(responder: &Responder, socket: &UdpSocket, datagram: &[u8], source: SocketAddr) {
        let Some(response) = responder.respond(datagram, source).await else {
            return;
        };
        if let Err(e) = socket.send_to(&response, source).await {
            warn!("Failed to send SNMP response to {}: {}", source, e);
        }
    }
}

/// IPv6-only UDP socket; Linux would otherwise map IPv4 onto `[::]` and
/// refuse the bind while `0.0.0.0` holds the same port.
fn bind_v6_only(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_only_v6(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

async fn recv_optional(
    socket: Option<&UdpSocket>,
    buf: &mut [u8],
) -> std::io::Result<(usize, SocketAddr)> {
    match socket {
        Some(socket) => socket.recv_from(buf).await,
        None => std::future::pending().await,
    }
}
