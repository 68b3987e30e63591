pub const CAPTIVE_TTL_SECS: u32 = 60;

const HEADER_LEN: usize = 12;
const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;
const FLAG_RESPONSE: u8 = 0x80;
const OPCODE_MASK: u8 = 0x78;

pub fn captive_response(query: &[u8], ip: [u8; 4]) -> Option<Vec<u8>> {
    if query.len() < HEADER_LEN {
        return None;
    }
    let flags = query[2];
    if flags & FLAG_RESPONSE != 0 || flags & OPCODE_MASK != 0 {
        return None;
    }
    if u16::from_be_bytes([query[4], query[5]]) == 0 {
        return None;
    }

    let name_end = question_name_end(query)?;
    let question_end = name_end + 4;
    if query.len() < question_end {
        return None;
    }
    let qtype = u16::from_be_bytes([query[name_end], query[name_end + 1]]);
    let qclass = u16::from_be_bytes([query[name_end + 2], query[name_end + 3]]);
    let answer = qtype == TYPE_A && qclass == CLASS_IN;

    let mut response = Vec::with_capacity(question_end + 16);
    response.extend_from_slice(&query[..2]);
    // QR + AA, keep RD from the query; RA set.
    response.push(FLAG_RESPONSE | 0x04 | (flags & 0x01));
    response.push(0x80);
    response.extend_from_slice(&1u16.to_be_bytes());
    response.extend_from_slice(&u16::from(answer).to_be_bytes());
    response.extend_from_slice(&[0, 0, 0, 0]);
    response.extend_from_slice(&query[HEADER_LEN..question_end]);

    if answer {
        // Compressed pointer to the name at offset 12.
        response.extend_from_slice(&[0xc0, HEADER_LEN as u8]);
        response.extend_from_slice(&TYPE_A.to_be_bytes());
        response.extend_from_slice(&CLASS_IN.to_be_bytes());
        response.extend_from_slice(&CAPTIVE_TTL_SECS.to_be_bytes());
        response.extend_from_slice(&4u16.to_be_bytes());
        response.extend_from_slice(&ip);
    }

    Some(response)
}

fn question_name_end(packet: &[u8]) -> Option<usize> {
    let mut offset = HEADER_LEN;
    loop {
        let len = *packet.get(offset)? as usize;
        if len == 0 {
            return Some(offset + 1);
        }
        // Compression is not valid in a query's first question.
        if len & 0xc0 != 0 {
            return None;
        }
        offset += 1 + len;
    }
}
