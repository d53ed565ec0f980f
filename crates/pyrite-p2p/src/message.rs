use tokio::io::{AsyncReadExt, AsyncWriteExt};

use pyrite_core::codec::{self, Decode, Decoder, Encode, Encoder};
use pyrite_core::{Address, Error, ImmutableBlock, Result, Sha256, Transaction};

/// Frames larger than this are treated as protocol violations.
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// A peer as advertised through lookups: routing address plus reachable
/// endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub address: Address,
    pub host: String,
    pub port: u16,
}

impl Encode for PeerInfo {
    fn encode(&self, enc: &mut Encoder) {
        self.address.encode(enc);
        self.host.encode(enc);
        self.port.encode(enc);
    }
}

impl Decode for PeerInfo {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            address: Address::decode(dec)?,
            host: String::decode(dec)?,
            port: u16::decode(dec)?,
        })
    }
}

/// Why an inbound session was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RefusalReason {
    BucketFull = 1,
    BadRating = 2,
}

/// Everything two peers say to each other. On the wire: a one-byte tag
/// followed by the payload fields, inside a length-prefixed frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Handshake {
        address: Address,
        public_port: u16,
        top_block_hash: Sha256,
    },
    Ping,
    Pong,
    Transaction(Transaction),
    Block(ImmutableBlock),
    GetBlock(Sha256),
    BlockNotFound(Sha256),
    Lookup {
        address: Address,
        selection_size: u8,
    },
    LookupResponse {
        address: Address,
        peers: Vec<PeerInfo>,
    },
    CannotAccept {
        reason: RefusalReason,
        alternates: Vec<PeerInfo>,
    },
    Accepted {
        address: Address,
        public_port: u16,
        top_block_hash: Sha256,
    },
    Close,
}

const TAG_HANDSHAKE: u8 = 1;
const TAG_PING: u8 = 2;
const TAG_PONG: u8 = 3;
const TAG_TRANSACTION: u8 = 4;
const TAG_BLOCK: u8 = 5;
const TAG_GET_BLOCK: u8 = 6;
const TAG_BLOCK_NOT_FOUND: u8 = 7;
const TAG_LOOKUP: u8 = 8;
const TAG_LOOKUP_RESPONSE: u8 = 9;
const TAG_CANNOT_ACCEPT: u8 = 10;
const TAG_ACCEPTED: u8 = 11;
const TAG_CLOSE: u8 = 12;

impl Encode for Message {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            Message::Handshake {
                address,
                public_port,
                top_block_hash,
            } => {
                TAG_HANDSHAKE.encode(enc);
                address.encode(enc);
                public_port.encode(enc);
                top_block_hash.encode(enc);
            }
            Message::Ping => TAG_PING.encode(enc),
            Message::Pong => TAG_PONG.encode(enc),
            Message::Transaction(tx) => {
                TAG_TRANSACTION.encode(enc);
                tx.encode(enc);
            }
            Message::Block(block) => {
                TAG_BLOCK.encode(enc);
                block.encode(enc);
            }
            Message::GetBlock(hash) => {
                TAG_GET_BLOCK.encode(enc);
                hash.encode(enc);
            }
            Message::BlockNotFound(hash) => {
                TAG_BLOCK_NOT_FOUND.encode(enc);
                hash.encode(enc);
            }
            Message::Lookup {
                address,
                selection_size,
            } => {
                TAG_LOOKUP.encode(enc);
                address.encode(enc);
                selection_size.encode(enc);
            }
            Message::LookupResponse { address, peers } => {
                TAG_LOOKUP_RESPONSE.encode(enc);
                address.encode(enc);
                peers.encode(enc);
            }
            Message::CannotAccept { reason, alternates } => {
                TAG_CANNOT_ACCEPT.encode(enc);
                (*reason as u8).encode(enc);
                alternates.encode(enc);
            }
            Message::Accepted {
                address,
                public_port,
                top_block_hash,
            } => {
                TAG_ACCEPTED.encode(enc);
                address.encode(enc);
                public_port.encode(enc);
                top_block_hash.encode(enc);
            }
            Message::Close => TAG_CLOSE.encode(enc),
        }
    }
}

impl Decode for Message {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let tag = u8::decode(dec)?;
        let message = match tag {
            TAG_HANDSHAKE => Message::Handshake {
                address: Address::decode(dec)?,
                public_port: u16::decode(dec)?,
                top_block_hash: Sha256::decode(dec)?,
            },
            TAG_PING => Message::Ping,
            TAG_PONG => Message::Pong,
            TAG_TRANSACTION => Message::Transaction(Transaction::decode(dec)?),
            TAG_BLOCK => Message::Block(ImmutableBlock::decode(dec)?),
            TAG_GET_BLOCK => Message::GetBlock(Sha256::decode(dec)?),
            TAG_BLOCK_NOT_FOUND => Message::BlockNotFound(Sha256::decode(dec)?),
            TAG_LOOKUP => Message::Lookup {
                address: Address::decode(dec)?,
                selection_size: u8::decode(dec)?,
            },
            TAG_LOOKUP_RESPONSE => Message::LookupResponse {
                address: Address::decode(dec)?,
                peers: Vec::<PeerInfo>::decode(dec)?,
            },
            TAG_CANNOT_ACCEPT => {
                let reason = match u8::decode(dec)? {
                    1 => RefusalReason::BucketFull,
                    2 => RefusalReason::BadRating,
                    other => {
                        return Err(Error::InvalidArgument(format!(
                            "unknown refusal reason {other}"
                        )))
                    }
                };
                Message::CannotAccept {
                    reason,
                    alternates: Vec::<PeerInfo>::decode(dec)?,
                }
            }
            TAG_ACCEPTED => Message::Accepted {
                address: Address::decode(dec)?,
                public_port: u16::decode(dec)?,
                top_block_hash: Sha256::decode(dec)?,
            },
            TAG_CLOSE => Message::Close,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown message tag {other}"
                )))
            }
        };
        Ok(message)
    }
}

/// Write one length-prefixed message frame.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, message: &Message) -> Result<()> {
    let payload = codec::to_bytes(message);
    let len = payload.len() as u32;
    writer
        .write_all(&len.to_le_bytes())
        .await
        .map_err(|e| Error::Network(e.to_string()))?;
    writer
        .write_all(&payload)
        .await
        .map_err(|e| Error::Network(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Network(e.to_string()))?;
    Ok(())
}

/// Read one length-prefixed message frame.
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Message> {
    let len = reader
        .read_u32_le()
        .await
        .map_err(|e| Error::Network(e.to_string()))?;
    if len > MAX_FRAME_BYTES {
        return Err(Error::Network(format!("oversized frame of {len} bytes")));
    }
    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| Error::Network(e.to_string()))?;
    codec::from_bytes(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyrite_core::Balance;

    fn sample_tx() -> Transaction {
        Transaction::new(
            Address::from_bytes([1; 20]),
            Address::from_bytes([2; 20]),
            Balance::from(10u64),
            1,
            1_583_789_700,
            b"data".to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn message_codec_round_trips() {
        let messages = vec![
            Message::Handshake {
                address: Address::from_bytes([3; 20]),
                public_port: 20203,
                top_block_hash: Sha256::compute(b"tip"),
            },
            Message::Ping,
            Message::Pong,
            Message::Transaction(sample_tx()),
            Message::GetBlock(Sha256::compute(b"block")),
            Message::BlockNotFound(Sha256::compute(b"block")),
            Message::Lookup {
                address: Address::from_bytes([4; 20]),
                selection_size: 8,
            },
            Message::LookupResponse {
                address: Address::from_bytes([4; 20]),
                peers: vec![PeerInfo {
                    address: Address::from_bytes([5; 20]),
                    host: "10.0.0.5".into(),
                    port: 20203,
                }],
            },
            Message::CannotAccept {
                reason: RefusalReason::BucketFull,
                alternates: vec![],
            },
            Message::Accepted {
                address: Address::from_bytes([6; 20]),
                public_port: 20204,
                top_block_hash: Sha256::compute(b"tip"),
            },
            Message::Close,
        ];
        for message in messages {
            let decoded: Message = codec::from_bytes(&codec::to_bytes(&message)).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(codec::from_bytes::<Message>(&[0xEF]).is_err());
    }

    #[tokio::test]
    async fn frame_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, &Message::Ping).await.unwrap();
        assert_eq!(read_frame(&mut b).await.unwrap(), Message::Ping);
    }

    #[tokio::test]
    async fn oversized_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let len = (MAX_FRAME_BYTES + 1).to_le_bytes();
        tokio::io::AsyncWriteExt::write_all(&mut a, &len).await.unwrap();
        assert!(read_frame(&mut b).await.is_err());
    }
}
