use std::time::{Duration, Instant};

use pyrite_core::Address;

use crate::message::PeerInfo;

/// Peers per XOR-distance bucket.
pub const MAX_BUCKET_SIZE: usize = 10;

/// How often live sessions ping. A bucket's least-recently-seen entry is
/// only protected from eviction while it has spoken within twice this.
pub const PING_FREQUENCY: Duration = Duration::from_secs(30);

const BUCKET_COUNT: usize = Address::LENGTH * 8;

struct Entry {
    info: PeerInfo,
    last_seen: Instant,
}

/// Kademlia-style routing table: one bucket per XOR-distance bit from the
/// local address.
pub struct RoutingTable {
    local: Address,
    buckets: Vec<Vec<Entry>>,
}

impl RoutingTable {
    pub fn new(local: Address) -> Self {
        Self {
            local,
            buckets: (0..BUCKET_COUNT).map(|_| Vec::new()).collect(),
        }
    }

    /// Index of the bucket `other` falls into: the position of the highest
    /// differing bit. `None` for the local address itself.
    fn bucket_index(&self, other: &Address) -> Option<usize> {
        for (byte_index, (a, b)) in self
            .local
            .as_bytes()
            .iter()
            .zip(other.as_bytes())
            .enumerate()
        {
            let xor = a ^ b;
            if xor != 0 {
                return Some(byte_index * 8 + xor.leading_zeros() as usize);
            }
        }
        None
    }

    /// Admit a peer. A full bucket refuses only while its least-recently-seen
    /// entry has spoken within `2 × PING_FREQUENCY`; otherwise that entry is
    /// evicted in favor of the newcomer.
    pub fn try_add(&mut self, info: PeerInfo) -> bool {
        let Some(index) = self.bucket_index(&info.address) else {
            return false;
        };
        let bucket = &mut self.buckets[index];

        if let Some(existing) = bucket.iter_mut().find(|e| e.info.address == info.address) {
            existing.info = info;
            existing.last_seen = Instant::now();
            return true;
        }

        if bucket.len() >= MAX_BUCKET_SIZE {
            let (lru_index, lru) = bucket
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.last_seen)
                .expect("full bucket is non-empty");
            if lru.last_seen.elapsed() < 2 * PING_FREQUENCY {
                return false;
            }
            bucket.swap_remove(lru_index);
        }

        bucket.push(Entry {
            info,
            last_seen: Instant::now(),
        });
        true
    }

    /// Refresh a peer's liveness stamp.
    pub fn mark_seen(&mut self, address: &Address) {
        if let Some(index) = self.bucket_index(address) {
            if let Some(entry) = self.buckets[index]
                .iter_mut()
                .find(|e| e.info.address == *address)
            {
                entry.last_seen = Instant::now();
            }
        }
    }

    pub fn remove(&mut self, address: &Address) {
        if let Some(index) = self.bucket_index(address) {
            self.buckets[index].retain(|e| e.info.address != *address);
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.bucket_index(address)
            .map(|i| self.buckets[i].iter().any(|e| e.info.address == *address))
            .unwrap_or(false)
    }

    /// Up to `count` known peers closest to `target` by XOR distance.
    pub fn closest(&self, target: &Address, count: usize) -> Vec<PeerInfo> {
        let mut peers: Vec<&Entry> = self.buckets.iter().flatten().collect();
        peers.sort_by_key(|e| xor_distance(&e.info.address, target));
        peers.into_iter().take(count).map(|e| e.info.clone()).collect()
    }

    pub fn all_info(&self) -> Vec<PeerInfo> {
        self.buckets
            .iter()
            .flatten()
            .map(|e| e.info.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn xor_distance(a: &Address, b: &Address) -> [u8; Address::LENGTH] {
    let mut distance = [0u8; Address::LENGTH];
    for (i, byte) in distance.iter_mut().enumerate() {
        *byte = a.as_bytes()[i] ^ b.as_bytes()[i];
    }
    distance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(bytes: [u8; 20]) -> PeerInfo {
        PeerInfo {
            address: Address::from_bytes(bytes),
            host: "127.0.0.1".into(),
            port: 20203,
        }
    }

    fn peer_with_prefix(first: u8, tail: u8) -> PeerInfo {
        let mut bytes = [0u8; 20];
        bytes[0] = first;
        bytes[19] = tail;
        peer(bytes)
    }

    #[test]
    fn local_address_is_never_admitted() {
        let mut table = RoutingTable::new(Address::from_bytes([7; 20]));
        assert!(!table.try_add(peer([7; 20])));
    }

    #[test]
    fn peers_land_in_distance_buckets() {
        let mut table = RoutingTable::new(Address::null());
        assert!(table.try_add(peer_with_prefix(0x80, 1)));
        assert!(table.try_add(peer_with_prefix(0x01, 2)));
        assert_eq!(table.len(), 2);
        assert!(table.contains(&Address::from_bytes({
            let mut b = [0u8; 20];
            b[0] = 0x80;
            b[19] = 1;
            b
        })));
    }

    #[test]
    fn full_bucket_with_fresh_lru_refuses() {
        let mut table = RoutingTable::new(Address::null());
        // All these share bucket 0 (highest bit differs).
        for i in 0..MAX_BUCKET_SIZE as u8 {
            assert!(table.try_add(peer_with_prefix(0x80, i)));
        }
        assert!(!table.try_add(peer_with_prefix(0x80, 0xEE)));
        assert_eq!(table.len(), MAX_BUCKET_SIZE);
    }

    #[test]
    fn re_adding_known_peer_refreshes_it() {
        let mut table = RoutingTable::new(Address::null());
        assert!(table.try_add(peer_with_prefix(0x80, 1)));
        assert!(table.try_add(peer_with_prefix(0x80, 1)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn closest_orders_by_xor_distance() {
        let mut table = RoutingTable::new(Address::null());
        let near = peer_with_prefix(0x01, 1);
        let far = peer_with_prefix(0xF0, 2);
        table.try_add(near.clone());
        table.try_add(far.clone());

        let target = Address::from_bytes({
            let mut b = [0u8; 20];
            b[0] = 0x01;
            b
        });
        let closest = table.closest(&target, 1);
        assert_eq!(closest, vec![near]);
    }

    #[test]
    fn remove_drops_the_peer() {
        let mut table = RoutingTable::new(Address::null());
        let info = peer_with_prefix(0x80, 1);
        table.try_add(info.clone());
        table.remove(&info.address);
        assert!(table.is_empty());
    }
}
