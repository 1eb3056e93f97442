/// Market record decoder conformance tests

use market_feed::{DecodeError, FrameCodec, MarketDataRecord, MarketRecordDecoder, ReassemblyBuffer};
use byteorder::{LittleEndian, ByteOrder};

// Helper to lay out a 64-byte record field by field
fn create_record(fields: [u32; 16]) -> Vec<u8> {
    let mut rec = vec![0u8; 64];
    for (i, value) in fields.iter().enumerate() {
        LittleEndian::write_u32(&mut rec[i * 4..i * 4 + 4], *value);
    }
    rec
}

fn touchline_message(record: &[u8]) -> Vec<u8> {
    let mut msg = b"63=FT3.0|64=209|65=84|66=10:01:02|4=NSE|50=".to_vec();
    msg.extend_from_slice(record);
    msg
}

#[test]
fn test_decode_known_values() {
    let mut fields = [0u32; 16];
    fields[0] = 1; // segment
    fields[1] = 22; // token
    fields[4] = 15075; // ltp
    fields[13] = 2; // decimal locator
    let msg = touchline_message(&create_record(fields));

    let text = MarketRecordDecoder::new().decode(&msg).unwrap();
    assert!(text.starts_with("63=FT3.0|64=209|65=84|66=10:01:02|4=NSE|1=1|7=22|"));
    assert!(text.contains("|8=15075|"));
    assert!(text.ends_with("|399=2|250=0|88=0|"));
}

#[test]
fn test_all_fields_rendered_in_order() {
    let mut fields = [0u32; 16];
    for (i, f) in fields.iter_mut().enumerate() {
        *f = 1000 + i as u32;
    }
    // time fields: one day and one hour past the epoch
    fields[2] = 86_400;
    fields[3] = 3_600;
    let msg = touchline_message(&create_record(fields));

    let text = MarketRecordDecoder::new().decode(&msg).unwrap();
    let rendered = text.split_once("|4=NSE|").unwrap().1;
    assert_eq!(
        rendered,
        "1=1000|7=1001|74=1980-01-02 000000|73=1980-01-01 010000|8=1004|2=1005|3=1006|\
         5=1007|6=1008|75=1009|77=1010|78=1011|76=1012|399=1013|250=1014|88=1015|"
    );
}

#[test]
fn test_negative_time_offset() {
    let mut rec = create_record([0u32; 16]);
    LittleEndian::write_i32(&mut rec[8..12], -60);
    let parsed = MarketDataRecord::parse(&rec).unwrap();
    assert_eq!(parsed.last_update_time, -60);

    let msg = touchline_message(&rec);
    let text = MarketRecordDecoder::new().decode(&msg).unwrap();
    assert!(text.contains("|74=1979-12-31 235900|"));
}

#[test]
fn test_trailing_bytes_after_record_dropped() {
    let mut msg = touchline_message(&create_record([7u32; 16]));
    msg.extend_from_slice(b"|trailing=1|");
    let text = MarketRecordDecoder::new().decode(&msg).unwrap();
    assert!(text.ends_with("|88=7|"));
}

#[test]
fn test_record_truncated_to_63_bytes() {
    let rec = create_record([9u32; 16]);
    let msg = touchline_message(&rec[..63]);
    let result = MarketRecordDecoder::new().decode(&msg);
    assert_eq!(result, Err(DecodeError::TruncatedRecord { need: 64, have: 63 }));
}

#[test]
fn test_plain_text_passthrough() {
    let msg = b"63=FT3.0|64=209|1=1|7=22|8=15075|399=2|";
    let text = MarketRecordDecoder::new().decode(msg).unwrap();
    assert_eq!(text, "63=FT3.0|64=209|1=1|7=22|8=15075|399=2|");
}

#[test]
fn test_record_bytes_containing_marker_text() {
    // the record itself may contain "|50=" bytes, only the first marker counts
    let mut fields = [0u32; 16];
    fields[4] = u32::from_le_bytes(*b"|50=");
    let msg = touchline_message(&create_record(fields));
    let text = MarketRecordDecoder::new().decode(&msg).unwrap();
    assert!(text.contains(&format!("|8={}|", u32::from_le_bytes(*b"|50="))));
}

#[test]
fn test_invalid_utf8_bytes_are_dropped() {
    let decoder = MarketRecordDecoder::new();
    assert_eq!(decoder.decode(b"63=FT3.0|8=1\xff|7=22|").unwrap(), "63=FT3.0|8=1|7=22|");

    let mut fields = [0u32; 16];
    fields[1] = 22;
    let mut msg = b"63=FT3.0|4=N\xffSE|50=".to_vec();
    msg.extend_from_slice(&create_record(fields));
    let text = decoder.decode(&msg).unwrap();
    assert!(text.starts_with("63=FT3.0|4=NSE|1=0|7=22|"));
    assert!(text.ends_with("|88=0|"));
}

#[test]
fn test_custom_marker() {
    let decoder = MarketRecordDecoder::with_marker(b"|99=");
    let mut msg = b"63=FT3.0|99=".to_vec();
    msg.extend_from_slice(&create_record([3u32; 16]));
    let text = decoder.decode(&msg).unwrap();
    assert!(text.starts_with("63=FT3.0|1=3|7=3|"));

    // the default marker is not recognized by this decoder
    assert_eq!(decoder.find_marker(b"63=FT3.0|50="), None);
}

#[test]
fn test_decode_through_reassembly() {
    let mut fields = [0u32; 16];
    fields[0] = 1;
    fields[1] = 2885;
    fields[4] = 250_050;
    fields[13] = 2;
    let msg = touchline_message(&create_record(fields));
    let frame = FrameCodec::wrap_sub_messages(&[msg.as_slice(), b"63=FT3.0|64=209|1=1|7=22|"]).unwrap();

    let mut buf = ReassemblyBuffer::new();
    let payloads: Vec<Vec<u8>> = buf.push(&frame).into_iter().map(|f| f.unwrap()).collect();
    assert_eq!(payloads.len(), 1);

    let decoder = MarketRecordDecoder::new();
    let texts: Vec<String> = FrameCodec::split(&payloads[0])
        .into_iter()
        .map(|sub| decoder.decode(sub).unwrap().into_owned())
        .collect();
    assert_eq!(texts.len(), 2);
    assert!(texts[0].contains("|1=1|7=2885|"));
    assert!(texts[0].contains("|8=250050|"));
    assert_eq!(texts[1], "63=FT3.0|64=209|1=1|7=22|");
}
