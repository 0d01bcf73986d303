// Path: crates/remote/src/gitserve/pktline.rs

//! pkt-line framing for the git smart protocol.
//!
//! Framing must stay bit-exact with upstream git: four lowercase hex length
//! digits (length includes the prefix itself), `0000` as the flush packet,
//! and sideband-64k multiplexing with channels 1 (pack data), 2 (progress),
//! and 3 (error).

use gitmesh_types::error::PushError;

/// The flush packet.
pub const FLUSH: &[u8] = b"0000";

/// Maximum payload of one sideband-64k frame (65520 minus prefix and band).
pub const SIDEBAND_MAX_DATA: usize = 65_515;

/// Sideband channel carrying pack data / report-status.
pub const BAND_DATA: u8 = 1;

/// Sideband channel carrying progress messages.
pub const BAND_PROGRESS: u8 = 2;

/// Sideband channel carrying a fatal error message.
pub const BAND_ERROR: u8 = 3;

/// Encodes one pkt-line.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = format!("{:04x}", data.len() + 4).into_bytes();
    out.extend_from_slice(data);
    out
}

/// Encodes one textual pkt-line with a trailing newline, the form git uses
/// for commands and status lines.
pub fn encode_line(text: &str) -> Vec<u8> {
    let mut data = text.as_bytes().to_vec();
    data.push(b'\n');
    encode(&data)
}

/// One parsed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// A flush packet (`0000`).
    Flush,
    /// A data packet with its payload.
    Data(Vec<u8>),
}

/// Reads one packet from the front of `input`, returning it and the number
/// of bytes consumed.
pub fn read_packet(input: &[u8]) -> Result<(Packet, usize), PushError> {
    if input.len() < 4 {
        return Err(PushError::BadEncoding("truncated pkt-line header".into()));
    }
    let header = std::str::from_utf8(&input[..4])
        .map_err(|_| PushError::BadEncoding("non-ascii pkt-line header".into()))?;
    let len = usize::from_str_radix(header, 16)
        .map_err(|_| PushError::BadEncoding(format!("bad pkt-line length {:?}", header)))?;

    if len == 0 {
        return Ok((Packet::Flush, 4));
    }
    if len < 4 || len > input.len() {
        return Err(PushError::BadEncoding(format!(
            "pkt-line length {} out of range",
            len
        )));
    }
    Ok((Packet::Data(input[4..len].to_vec()), len))
}

/// Parses a full pkt-line stream into data payloads, dropping flushes.
pub fn parse_lines(mut input: &[u8]) -> Result<Vec<Vec<u8>>, PushError> {
    let mut lines = Vec::new();
    while !input.is_empty() {
        let (packet, consumed) = read_packet(input)?;
        input = &input[consumed..];
        if let Packet::Data(data) = packet {
            lines.push(data);
        }
    }
    Ok(lines)
}

/// Splits a `git-receive-pack` request body into its command list and the
/// trailing packfile. Commands are `old new refname` with the first line
/// optionally carrying a NUL-separated capability list.
pub fn parse_receive_request(
    input: &[u8],
) -> Result<(Vec<(String, String, String)>, Vec<u8>), PushError> {
    let mut commands = Vec::new();
    let mut rest = input;

    loop {
        if rest.is_empty() {
            return Ok((commands, Vec::new()));
        }
        let (packet, consumed) = read_packet(rest)?;
        rest = &rest[consumed..];
        let data = match packet {
            Packet::Flush => break,
            Packet::Data(data) => data,
        };

        let line = String::from_utf8(data)
            .map_err(|_| PushError::BadEncoding("non-utf8 command line".into()))?;
        let line = line.split('\0').next().unwrap_or_default().trim_end();
        let mut parts = line.splitn(3, ' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(old), Some(new), Some(name)) if old.len() == 40 && new.len() == 40 => {
                commands.push((old.to_string(), new.to_string(), name.to_string()));
            }
            _ => {
                return Err(PushError::BadEncoding(format!(
                    "malformed update command {:?}",
                    line
                )))
            }
        }
    }

    Ok((commands, rest.to_vec()))
}

/// Wraps data into sideband-64k frames on the given band.
pub fn sideband(band: u8, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in data.chunks(SIDEBAND_MAX_DATA) {
        let mut frame = Vec::with_capacity(chunk.len() + 1);
        frame.push(band);
        frame.extend_from_slice(chunk);
        out.extend(encode(&frame));
    }
    out
}

/// A sideband error frame followed by a flush, the form git clients print
/// as `remote: fatal: …`.
pub fn sideband_error(message: &str) -> Vec<u8> {
    let mut out = sideband(BAND_ERROR, format!("{}\n", message).as_bytes());
    out.extend_from_slice(FLUSH);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_matches_git_framing() {
        assert_eq!(encode(b"a"), b"0005a".to_vec());
        assert_eq!(encode_line("unpack ok"), b"000eunpack ok\n".to_vec());
        assert_eq!(FLUSH, b"0000");
    }

    #[test]
    fn packet_roundtrip() {
        let mut stream = encode(b"hello");
        stream.extend_from_slice(FLUSH);
        let (packet, consumed) = read_packet(&stream).unwrap();
        assert_eq!(packet, Packet::Data(b"hello".to_vec()));
        let (packet, _) = read_packet(&stream[consumed..]).unwrap();
        assert_eq!(packet, Packet::Flush);
    }

    #[test]
    fn receive_request_splits_commands_and_pack() {
        let old = "0".repeat(40);
        let new = "a".repeat(40);
        let mut body = encode(
            format!(
                "{} {} refs/heads/master\0report-status agent=git/2.40",
                old, new
            )
            .as_bytes(),
        );
        body.extend(encode(format!("{} {} refs/heads/dev", old, new).as_bytes()));
        body.extend_from_slice(FLUSH);
        body.extend_from_slice(b"PACKDATA");

        let (commands, pack) = parse_receive_request(&body).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].2, "refs/heads/master");
        assert_eq!(commands[1].2, "refs/heads/dev");
        assert_eq!(pack, b"PACKDATA");
    }

    #[test]
    fn malformed_lengths_are_rejected() {
        assert!(read_packet(b"zzzz").is_err());
        assert!(read_packet(b"0003").is_err());
        assert!(read_packet(b"00ff").is_err());
    }

    #[test]
    fn sideband_error_frames_carry_band_three() {
        let frame = sideband_error("boom");
        let (packet, _) = read_packet(&frame).unwrap();
        match packet {
            Packet::Data(data) => {
                assert_eq!(data[0], BAND_ERROR);
                assert_eq!(&data[1..], b"boom\n");
            }
            other => panic!("unexpected packet: {:?}", other),
        }
    }
}
