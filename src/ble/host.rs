//! BLE keyboard host task - owns the connection lifecycle.
//!
//! One active keyboard at a time: scan until the filter accepts a
//! peripheral, connect with security, discover the HID service,
//! subscribe, then pump notifications until the link drops. A normal
//! link loss rescans automatically; a failure parks the task in the
//! `Error` state until the consumer sends a fresh `Start`.

use core::cell::RefCell;

use defmt::{debug, error, info, warn};
use embassy_futures::select::{select, Either};
use embassy_time::{with_timeout, Duration, Instant, Timer};
use heapless::Vec;
use nrf_softdevice::ble::security::{IoCapabilities, PasskeyReply, SecurityHandler};
use nrf_softdevice::ble::{
    central, Connection, EncryptError, EncryptionInfo, IdentityKey, MasterId, SecurityMode,
};
use nrf_softdevice::{raw, Flash, Softdevice};
use static_cell::StaticCell;

use crate::ble::address::PeerAddress;
use crate::ble::filter::KeyboardFilter;
use crate::ble::lifecycle::{Acquisition, ClientPool, Lifecycle, LinkEvent};
use crate::ble::{hid_client, scanner, CommandRx, EventTx, HostCommand, HostEvent, KeyboardCandidate};
use crate::config;
use crate::error::HostError;
use crate::hid::decoder::ReportDecoder;
use crate::input::SharedEventQueue;
use crate::storage::{BondedPeer, BOND_STORE, MAX_BOND_BLOB};

/// SoftDevice key material for one bonded peer.
///
/// `repr(C)` so the struct can round-trip through the bond store as
/// raw bytes; the layout is only ever read back by the same firmware
/// build that wrote it.
#[repr(C)]
#[derive(Clone, Copy)]
struct PeerBond {
    master_id: MasterId,
    key: EncryptionInfo,
    peer_id: IdentityKey,
}

impl PeerBond {
    fn to_blob(&self) -> Option<Vec<u8, MAX_BOND_BLOB>> {
        let bytes = unsafe {
            core::slice::from_raw_parts(
                (self as *const Self).cast::<u8>(),
                core::mem::size_of::<Self>(),
            )
        };
        Vec::from_slice(bytes).ok()
    }

    fn from_blob(blob: &[u8]) -> Option<Self> {
        if blob.len() != core::mem::size_of::<Self>() {
            return None;
        }
        Some(unsafe { core::ptr::read_unaligned(blob.as_ptr().cast()) })
    }
}

/// Security callbacks for pairing and bonding.
///
/// The RefCell is the working set the SoftDevice callbacks read
/// synchronously; at boot it is seeded from the flash bond store, and
/// the host task writes fresh keys back after a session comes up, so
/// a bonded keyboard re-encrypts across power cycles without pairing
/// again.
struct Bonder {
    peers: RefCell<Vec<PeerBond, { config::MAX_BONDED_PEERS }>>,
}

impl Bonder {
    fn new() -> Self {
        Self { peers: RefCell::new(Vec::new()) }
    }

    /// Seed the key cache from persisted records.
    fn restore_from(&self, store: &crate::storage::BondStore) {
        let mut peers = self.peers.borrow_mut();
        for record in store.iter() {
            let Some(blob) = record.bond.as_deref() else {
                continue;
            };
            let Some(bond) = PeerBond::from_blob(blob) else {
                warn!("discarding unreadable bond record");
                continue;
            };
            if peers.is_full() {
                break;
            }
            let _ = peers.push(bond);
        }
        info!("restored {} bond keys", peers.len());
    }

    /// Key material for the peer at `address`, serialized for storage.
    fn key_blob_for(&self, address: nrf_softdevice::ble::Address) -> Option<Vec<u8, MAX_BOND_BLOB>> {
        self.peers
            .borrow()
            .iter()
            .find(|p| p.peer_id.is_match(address))
            .and_then(PeerBond::to_blob)
    }
}

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        IoCapabilities::None
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        true
    }

    fn display_passkey(&self, passkey: &[u8; 6]) {
        info!("pairing passkey: {=[u8]:a}", passkey);
    }

    fn enter_passkey(&self, reply: PasskeyReply) {
        // Keyboards that insist on passkey entry get the fixed one.
        reply.reply(Some(&config::PAIRING_PASSKEY));
    }

    fn on_bonded(
        &self,
        _conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        info!("bonded with peer");
        let mut peers = self.peers.borrow_mut();
        if let Some(existing) = peers.iter_mut().find(|p| p.master_id == master_id) {
            existing.key = key;
            existing.peer_id = peer_id;
            return;
        }

        if peers.is_full() {
            peers.remove(0);
        }

        let _ = peers.push(PeerBond { master_id, key, peer_id });
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.peers
            .borrow()
            .iter()
            .find_map(|p| (p.master_id == master_id).then_some(p.key))
    }

    fn get_peripheral_key(&self, conn: &Connection) -> Option<(MasterId, EncryptionInfo)> {
        self.peers.borrow().iter().find_map(|p| {
            p.peer_id
                .is_match(conn.peer_address())
                .then_some((p.master_id, p.key))
        })
    }

    fn on_security_update(&self, _conn: &Connection, mode: SecurityMode) {
        info!("security mode updated: {}", mode);
    }
}

static BONDER: StaticCell<Bonder> = StaticCell::new();

/// Scan/connect/decode loop. Never returns.
pub async fn keyboard_host_task(
    sd: &'static Softdevice,
    cmd_rx: CommandRx,
    event_tx: EventTx,
    queue: &'static SharedEventQueue,
) -> ! {
    let bonder = BONDER.init(Bonder::new());

    let mut flash = Flash::take(sd);
    {
        let mut store = BOND_STORE.lock().await;
        store.load_from_flash(&mut flash).await;
        info!("bond store: {} known keyboards", store.len());
        bonder.restore_from(&store);
    }

    let mut lifecycle = Lifecycle::new();
    let mut pool = ClientPool::new();
    let mut decoder = ReportDecoder::new();

    wait_for_start(&cmd_rx).await;
    publish(&mut lifecycle, LinkEvent::StartRequested, &event_tx).await;

    loop {
        // The lifecycle reads Scanning every time we come back here.
        let filter = allowlist_filter().await;

        let candidate = match select(cmd_rx.receive(), scanner::find_keyboard(sd, &filter)).await {
            Either::First(HostCommand::Start) => continue,
            Either::First(HostCommand::Disconnect) => {
                info!("nothing to disconnect while scanning");
                continue;
            }
            Either::Second(Ok(candidate)) => candidate,
            Either::Second(Err(err)) => {
                fault(&mut lifecycle, err, &event_tx).await;
                wait_for_start(&cmd_rx).await;
                publish(&mut lifecycle, LinkEvent::StartRequested, &event_tx).await;
                continue;
            }
        };

        publish(&mut lifecycle, LinkEvent::KeyboardAccepted, &event_tx).await;

        let peer = PeerAddress::new(candidate.address.bytes());
        let slot = match pool.acquire(peer) {
            Ok(Acquisition::Reused(slot)) => {
                info!("reusing connection slot {} for a known peer", slot);
                slot
            }
            Ok(Acquisition::Recycled(slot)) => {
                info!("recycling connection slot {}", slot);
                slot
            }
            Ok(Acquisition::Fresh(slot)) => {
                info!("using connection slot {}", slot);
                slot
            }
            Err(err) => {
                fault(&mut lifecycle, err, &event_tx).await;
                wait_for_start(&cmd_rx).await;
                publish(&mut lifecycle, LinkEvent::StartRequested, &event_tx).await;
                continue;
            }
        };
        pool.mark_connected(slot);
        debug!(
            "{} of {} connection slots in use",
            pool.connected_count(),
            config::MAX_CONNECTIONS
        );

        let session = run_session(
            sd,
            bonder,
            &candidate,
            &mut lifecycle,
            &mut decoder,
            &mut flash,
            queue,
            &event_tx,
        );

        match select(cmd_rx.receive(), session).await {
            Either::First(cmd) => {
                // Dropping the session future tears the connection down.
                pool.mark_disconnected(slot);
                sweep(&mut decoder, queue);
                publish(&mut lifecycle, LinkEvent::LinkLost, &event_tx).await;
                event_tx.send(HostEvent::Disconnected).await;
                match cmd {
                    HostCommand::Disconnect => {
                        info!("disconnect requested");
                        wait_for_start(&cmd_rx).await;
                        publish(&mut lifecycle, LinkEvent::StartRequested, &event_tx).await;
                    }
                    HostCommand::Start => {
                        info!("restart requested, recycling the link");
                        resume(&mut lifecycle, &event_tx).await;
                    }
                }
            }
            Either::Second(Ok(())) => {
                pool.mark_disconnected(slot);
                sweep(&mut decoder, queue);
                publish(&mut lifecycle, LinkEvent::LinkLost, &event_tx).await;
                event_tx.send(HostEvent::Disconnected).await;
                resume(&mut lifecycle, &event_tx).await;
            }
            Either::Second(Err(HostError::ConnectFailed)) => {
                // Transient: the peer may advertise again right away.
                pool.mark_disconnected(slot);
                publish(&mut lifecycle, LinkEvent::LinkLost, &event_tx).await;
                resume(&mut lifecycle, &event_tx).await;
            }
            Either::Second(Err(err)) => {
                pool.mark_disconnected(slot);
                sweep(&mut decoder, queue);
                fault(&mut lifecycle, err, &event_tx).await;
                wait_for_start(&cmd_rx).await;
                publish(&mut lifecycle, LinkEvent::StartRequested, &event_tx).await;
            }
        }
    }
}

/// One connection from dial-up to link loss.
///
/// `Ok(())` means the notification loop ran and the link ended on its
/// own; any earlier exit carries the failure.
#[allow(clippy::too_many_arguments)]
async fn run_session(
    sd: &'static Softdevice,
    bonder: &'static Bonder,
    candidate: &KeyboardCandidate,
    lifecycle: &mut Lifecycle,
    decoder: &mut ReportDecoder,
    flash: &mut Flash,
    queue: &'static SharedEventQueue,
    event_tx: &EventTx,
) -> Result<(), HostError> {
    info!("connecting to {}", candidate.name.as_str());

    let whitelist = [&candidate.address];
    let conn_cfg = central::ConnectConfig {
        scan_config: central::ScanConfig {
            whitelist: Some(&whitelist),
            ..Default::default()
        },
        conn_params: raw::ble_gap_conn_params_t {
            min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
            max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
            slave_latency: config::BLE_SLAVE_LATENCY,
            conn_sup_timeout: config::BLE_SUP_TIMEOUT,
        },
        ..Default::default()
    };

    let connect = central::connect_with_security(sd, &conn_cfg, bonder);
    let timeout = Duration::from_millis(config::BLE_CONNECT_TIMEOUT_MS);
    let conn = match with_timeout(timeout, connect).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(err)) => {
            warn!("connect failed: {:?}", err);
            return Err(HostError::ConnectFailed);
        }
        Err(_) => {
            warn!("connect timed out after {} ms", config::BLE_CONNECT_TIMEOUT_MS);
            return Err(HostError::ConnectTimeout);
        }
    };

    publish(lifecycle, LinkEvent::LinkUp, event_tx).await;

    let secure_ok = match conn.encrypt() {
        Ok(()) => wait_for_secure_link(&conn).await,
        Err(EncryptError::PeerKeysNotFound) => {
            if conn.request_pairing().is_ok() {
                wait_for_secure_link(&conn).await
            } else {
                false
            }
        }
        Err(_) => false,
    };

    if !secure_ok {
        // A HID link never runs in plaintext.
        warn!("failed to secure link to {}", candidate.name.as_str());
        let _ = conn.disconnect();
        return Err(HostError::SecurityFailed);
    }

    publish(lifecycle, LinkEvent::EncryptionEstablished, event_tx).await;

    let client = hid_client::discover(&conn).await?;
    publish(lifecycle, LinkEvent::HidServiceFound, event_tx).await;

    let subscribed = hid_client::subscribe(&conn, &client).await?;
    debug!("{} input report subscriptions active", subscribed);
    publish(lifecycle, LinkEvent::SubscriptionsActive, event_tx).await;
    event_tx.send(HostEvent::Ready(candidate.name.clone())).await;

    // Remember the peer and its keys so it reconnects and re-encrypts
    // by address alone.
    {
        let mut store = BOND_STORE.lock().await;
        let mut record = BondedPeer::new(
            PeerAddress::new(candidate.address.bytes()),
            candidate.name.as_str(),
        );
        record.bond = bonder.key_blob_for(candidate.address);
        store.add(record);
        store.save_to_flash(flash).await;
    }

    hid_client::run_notification_loop(&conn, &client, decoder, queue).await;

    Ok(())
}

async fn wait_for_secure_link(conn: &Connection) -> bool {
    for _ in 0..25 {
        match conn.security_mode() {
            SecurityMode::NoAccess | SecurityMode::Open => {
                Timer::after(Duration::from_millis(200)).await
            }
            _ => return true,
        }
    }
    false
}

/// Push one release per key still held, then reset the decoder.
fn sweep(decoder: &mut ReportDecoder, queue: &'static SharedEventQueue) {
    let released = decoder.release_all(Instant::now().as_millis() as u32);
    if !released.is_empty() {
        info!("releasing {} keys held at link loss", released.len());
        for event in &released {
            queue.push(*event);
        }
    }
}

async fn publish(lifecycle: &mut Lifecycle, event: LinkEvent, event_tx: &EventTx) {
    let state = lifecycle.on_event(event);
    info!("link state: {}", state);
    event_tx.send(HostEvent::StateChanged(state)).await;
}

async fn resume(lifecycle: &mut Lifecycle, event_tx: &EventTx) {
    let state = lifecycle.resume_scanning();
    info!("link state: {}", state);
    event_tx.send(HostEvent::StateChanged(state)).await;
}

async fn fault(lifecycle: &mut Lifecycle, err: HostError, event_tx: &EventTx) {
    let state = lifecycle.on_event(LinkEvent::Failed(err));
    error!("host fault: {} (state {})", err, state);
    event_tx.send(HostEvent::StateChanged(state)).await;
    event_tx.send(HostEvent::Fault(err)).await;
}

async fn wait_for_start(cmd_rx: &CommandRx) {
    loop {
        match cmd_rx.receive().await {
            HostCommand::Start => return,
            HostCommand::Disconnect => {}
        }
    }
}

/// Build the scan filter from the persisted bond list.
async fn allowlist_filter() -> KeyboardFilter {
    let mut filter = KeyboardFilter::new();
    let store = BOND_STORE.lock().await;
    for peer in store.iter() {
        filter.allow(peer.address);
    }
    filter
}
