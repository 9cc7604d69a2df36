//! Frame codec round-trips and corruption detection through the public
//! API.

use recshard::{Error, FrameReader, FrameWriter};

fn frame_bytes(payloads: &[&[u8]]) -> anyhow::Result<Vec<u8>> {
    let mut writer = FrameWriter::new(Vec::new());
    for payload in payloads {
        writer.write(payload)?;
    }
    Ok(writer.into_inner()?)
}

#[test]
fn round_trips_payloads() -> anyhow::Result<()> {
    let payloads: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"x".to_vec(),
        b"hello world".to_vec(),
        vec![0xAB; 64 * 1024],
    ];
    let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();
    let bytes = frame_bytes(&refs)?;

    let mut reader = FrameReader::new(bytes.as_slice());
    for expected in &payloads {
        let got = reader.next()?.expect("payload present");
        assert_eq!(&got, expected);
    }
    assert!(reader.next()?.is_none());
    // End of stream is sticky.
    assert!(reader.next()?.is_none());
    Ok(())
}

#[test]
fn empty_input_is_a_clean_end() -> anyhow::Result<()> {
    let mut reader = FrameReader::new(&[][..]);
    assert!(reader.next()?.is_none());
    Ok(())
}

#[test]
fn wire_layout_is_stable() -> anyhow::Result<()> {
    let bytes = frame_bytes(&[b"payload"])?;
    // u64 length + u32 length crc + payload + u32 payload crc.
    assert_eq!(bytes.len(), 8 + 4 + 7 + 4);
    assert_eq!(&bytes[..8], &7u64.to_le_bytes());
    assert_eq!(&bytes[12..19], b"payload");
    Ok(())
}

#[test]
fn detects_length_corruption() -> anyhow::Result<()> {
    let mut bytes = frame_bytes(&[b"payload"])?;
    bytes[0] ^= 0x01;
    let mut reader = FrameReader::new(bytes.as_slice());
    assert!(matches!(reader.next(), Err(Error::InvalidHeaderChecksum)));
    Ok(())
}

#[test]
fn detects_length_crc_corruption() -> anyhow::Result<()> {
    let mut bytes = frame_bytes(&[b"payload"])?;
    bytes[8] ^= 0x01;
    let mut reader = FrameReader::new(bytes.as_slice());
    assert!(matches!(reader.next(), Err(Error::InvalidHeaderChecksum)));
    Ok(())
}

#[test]
fn detects_payload_corruption() -> anyhow::Result<()> {
    let mut bytes = frame_bytes(&[b"payload"])?;
    bytes[12] ^= 0x01;
    let mut reader = FrameReader::new(bytes.as_slice());
    assert!(matches!(reader.next(), Err(Error::InvalidPayloadChecksum)));
    Ok(())
}

#[test]
fn detects_payload_crc_corruption() -> anyhow::Result<()> {
    let mut bytes = frame_bytes(&[b"payload"])?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let mut reader = FrameReader::new(bytes.as_slice());
    assert!(matches!(reader.next(), Err(Error::InvalidPayloadChecksum)));
    Ok(())
}

#[test]
fn any_single_bit_flip_is_detected() -> anyhow::Result<()> {
    let clean = frame_bytes(&[b"bit flip coverage"])?;
    for index in 0..clean.len() {
        let mut bytes = clean.clone();
        bytes[index] ^= 0x10;
        let mut reader = FrameReader::new(bytes.as_slice());
        assert!(reader.next().is_err(), "flip at byte {index} went unnoticed");
    }
    Ok(())
}

#[test]
fn detects_truncation_anywhere_inside_a_frame() -> anyhow::Result<()> {
    let bytes = frame_bytes(&[b"hello world"])?;
    for cut in [5, 12, 15, bytes.len() - 1] {
        let mut reader = FrameReader::new(&bytes[..cut]);
        assert!(
            matches!(reader.next(), Err(Error::TruncatedFrame { .. })),
            "cut at {cut} not reported as truncation"
        );
    }
    Ok(())
}

#[test]
fn truncation_reports_expected_and_got() -> anyhow::Result<()> {
    let bytes = frame_bytes(&[b"hello world"])?;
    let mut reader = FrameReader::new(&bytes[..5]);
    match reader.next() {
        Err(Error::TruncatedFrame { expected, got }) => {
            assert_eq!(expected, 12);
            assert_eq!(got, 5);
        }
        other => panic!("expected truncation, got {other:?}"),
    }
    Ok(())
}

#[test]
fn reads_whole_frames_before_a_torn_tail() -> anyhow::Result<()> {
    let first = frame_bytes(&[b"complete"])?;
    let second = frame_bytes(&[b"torn off"])?;
    let mut bytes = first;
    bytes.extend_from_slice(&second[..second.len() - 6]);

    let mut reader = FrameReader::new(bytes.as_slice());
    assert_eq!(reader.next()?.as_deref(), Some(&b"complete"[..]));
    assert!(matches!(reader.next(), Err(Error::TruncatedFrame { .. })));
    Ok(())
}
