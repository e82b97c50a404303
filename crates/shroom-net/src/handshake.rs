//! Plaintext connection handshake.
//!
//! The first message on every connection, sent by the server at accept time
//! inside a two-byte length prefix and never encrypted. It carries the
//! protocol version, the sub-version string, both initial round keys, and
//! the locale; both endpoints derive their cipher directions from it.

use shroom_crypto::{RoundKey, ShroomVersion};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{DecodePacket, EncodePacket, NetError, NetResult, PacketReader, PacketWriter};

/// Largest legal handshake body.
pub const MAX_HANDSHAKE_LEN: u16 = 128;

/// Region code carried in the handshake.
///
/// The wire form is one byte in `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LocaleCode {
    /// Korea.
    Korea = 1,
    /// Korea test realm.
    KoreaTest = 2,
    /// Japan.
    Japan = 3,
    /// China.
    China = 4,
    /// China test realm.
    ChinaTest = 5,
    /// Taiwan.
    Taiwan = 6,
    /// South-east Asia.
    Sea = 7,
    /// Global.
    Global = 8,
    /// Europe.
    Europe = 9,
    /// Brazil.
    Rls = 10,
}

impl TryFrom<u8> for LocaleCode {
    type Error = NetError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::Korea,
            2 => Self::KoreaTest,
            3 => Self::Japan,
            4 => Self::China,
            5 => Self::ChinaTest,
            6 => Self::Taiwan,
            7 => Self::Sea,
            8 => Self::Global,
            9 => Self::Europe,
            10 => Self::Rls,
            other => return Err(NetError::InvalidLocale(other)),
        })
    }
}

/// The decoded handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Protocol version.
    pub version: ShroomVersion,
    /// Free-form sub-version tag, Latin-1.
    pub sub_version: String,
    /// Initial round key for the client-to-server direction.
    pub send_key: RoundKey,
    /// Initial round key for the server-to-client direction.
    pub recv_key: RoundKey,
    /// Region code.
    pub locale: LocaleCode,
}

impl Handshake {
    /// Encode into length-prefixed wire bytes.
    pub fn to_wire_bytes(&self) -> NetResult<Vec<u8>> {
        let mut w = PacketWriter::new();
        self.encode(&mut w)?;
        let body = w.into_packet();

        let len = body.len() as u16;
        debug_assert!(len >= 1 && len <= MAX_HANDSHAKE_LEN);

        let mut out = Vec::with_capacity(body.len() + 2);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(body.as_ref());
        Ok(out)
    }

    /// Write the length-prefixed handshake to a stream.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, io: &mut W) -> NetResult<()> {
        let bytes = self.to_wire_bytes()?;
        io.write_all(&bytes).await?;
        io.flush().await?;
        Ok(())
    }

    /// Read a length-prefixed handshake from a stream.
    ///
    /// The prefix must be in `1..=128`; anything else is a framing error.
    pub async fn read_from<R: AsyncRead + Unpin>(io: &mut R) -> NetResult<Self> {
        let mut prefix = [0u8; 2];
        io.read_exact(&mut prefix).await?;
        let len = u16::from_le_bytes(prefix);
        if len == 0 || len > MAX_HANDSHAKE_LEN {
            return Err(NetError::HandshakeLength(len));
        }

        let mut body = vec![0u8; usize::from(len)];
        io.read_exact(&mut body).await?;

        let mut r = PacketReader::new(&body);
        r.read_decode()
    }
}

impl EncodePacket for Handshake {
    fn encode(&self, w: &mut PacketWriter) -> NetResult<()> {
        w.write_u16(self.version.raw());
        w.write_str(&self.sub_version)?;
        w.write_u32(self.send_key.raw());
        w.write_u32(self.recv_key.raw());
        w.write_u8(self.locale as u8);
        Ok(())
    }
}

impl DecodePacket for Handshake {
    fn decode(r: &mut PacketReader<'_>) -> NetResult<Self> {
        Ok(Self {
            version: ShroomVersion::new(r.read_u16()?),
            sub_version: r.read_str()?,
            send_key: RoundKey::new(r.read_u32()?),
            recv_key: RoundKey::new(r.read_u32()?),
            locale: LocaleCode::try_from(r.read_u8()?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use shroom_crypto::{RoundKey, ShroomVersion};

    use super::{Handshake, LocaleCode};
    use crate::NetError;

    fn sample() -> Handshake {
        Handshake {
            version: ShroomVersion::new(95),
            sub_version: "1".to_string(),
            send_key: RoundKey::new(0x1122_3344),
            recv_key: RoundKey::new(0x5566_7788),
            locale: LocaleCode::Global,
        }
    }

    #[test]
    fn wire_layout_is_stable() {
        let bytes = sample().to_wire_bytes().unwrap();
        // prefix, version, sub-version, send key, recv key, locale
        assert_eq!(bytes[..2], [14, 0]);
        assert_eq!(bytes[2..4], [95, 0]);
        assert_eq!(bytes[4..6], [1, 0]);
        assert_eq!(bytes[6], b'1');
        assert_eq!(bytes[7..11], [0x44, 0x33, 0x22, 0x11]);
        assert_eq!(bytes[11..15], [0x88, 0x77, 0x66, 0x55]);
        assert_eq!(bytes[15], 8);
    }

    #[tokio::test]
    async fn round_trips_over_a_stream() {
        let hs = sample();
        let (mut client, mut server) = tokio::io::duplex(256);

        hs.write_to(&mut server).await.unwrap();
        let decoded = Handshake::read_from(&mut client).await.unwrap();
        assert_eq!(decoded, hs);
    }

    #[tokio::test]
    async fn oversized_prefix_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(256);
        tokio::io::AsyncWriteExt::write_all(&mut server, &[200, 0])
            .await
            .unwrap();
        let err = Handshake::read_from(&mut client).await.unwrap_err();
        assert!(matches!(err, NetError::HandshakeLength(200)));
    }

    #[tokio::test]
    async fn zero_prefix_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(256);
        tokio::io::AsyncWriteExt::write_all(&mut server, &[0, 0]).await.unwrap();
        let err = Handshake::read_from(&mut client).await.unwrap_err();
        assert!(matches!(err, NetError::HandshakeLength(0)));
    }

    #[test]
    fn locale_range_is_validated() {
        assert!(LocaleCode::try_from(0).is_err());
        assert!(LocaleCode::try_from(11).is_err());
        assert_eq!(LocaleCode::try_from(8).unwrap(), LocaleCode::Global);
    }
}
