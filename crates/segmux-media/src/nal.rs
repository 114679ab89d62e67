//! Annex-B NAL unit splitting.

use segmux_common::CodecType;

/// H.264 sequence parameter set.
pub const H264_SPS: u8 = 7;
/// H.264 picture parameter set.
pub const H264_PPS: u8 = 8;
/// H.265 video parameter set.
pub const H265_VPS: u8 = 32;
/// H.265 sequence parameter set.
pub const H265_SPS: u8 = 33;
/// H.265 picture parameter set.
pub const H265_PPS: u8 = 34;

/// One NAL unit located inside an Annex-B byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    /// The unit including its leading start code.
    pub with_start_code: &'a [u8],
    /// The unit without its start code (header byte first).
    pub payload: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// Decode the NAL unit type for `codec`.
    ///
    /// Returns `None` for non-NAL codecs or an empty unit.
    pub fn unit_type(&self, codec: CodecType) -> Option<u8> {
        let header = *self.payload.first()?;
        match codec {
            CodecType::H264 => Some(header & 0x1F),
            CodecType::H265 => Some((header >> 1) & 0x3F),
            _ => None,
        }
    }
}

/// Split an Annex-B byte stream on 3- and 4-byte start codes.
///
/// Bytes before the first start code are ignored. Units that consist of a
/// start code only are skipped.
pub fn split_annex_b(data: &[u8]) -> Vec<NalUnit<'_>> {
    // (start code offset, payload offset)
    let mut starts: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                starts.push((i, i + 3));
                i += 3;
                continue;
            } else if i + 3 < data.len() && data[i + 2] == 0 && data[i + 3] == 1 {
                starts.push((i, i + 4));
                i += 4;
                continue;
            }
        }
        i += 1;
    }

    let mut units = Vec::with_capacity(starts.len());
    for (idx, &(code_at, payload_at)) in starts.iter().enumerate() {
        let end = starts
            .get(idx + 1)
            .map(|&(next_code, _)| next_code)
            .unwrap_or(data.len());
        if payload_at >= end {
            continue;
        }
        units.push(NalUnit {
            with_start_code: &data[code_at..end],
            payload: &data[payload_at..end],
        });
    }

    units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_mixed_start_codes() {
        let data = [
            0, 0, 0, 1, 0x67, 0xAA, // SPS, 4-byte code
            0, 0, 1, 0x68, 0xBB, // PPS, 3-byte code
            0, 0, 0, 1, 0x65, 0x01, 0x02, // IDR slice
        ];
        let units = split_annex_b(&data);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].payload, &[0x67, 0xAA]);
        assert_eq!(units[0].with_start_code, &[0, 0, 0, 1, 0x67, 0xAA]);
        assert_eq!(units[1].payload, &[0x68, 0xBB]);
        assert_eq!(units[2].unit_type(CodecType::H264), Some(5));
    }

    #[test]
    fn leading_garbage_is_ignored() {
        let data = [0xFF, 0xEE, 0, 0, 1, 0x67];
        let units = split_annex_b(&data);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit_type(CodecType::H264), Some(H264_SPS));
    }

    #[test]
    fn hevc_unit_types() {
        // VPS header is 0x40 0x01
        let data = [0, 0, 0, 1, 0x40, 0x01, 0, 0, 0, 1, 0x42, 0x01];
        let units = split_annex_b(&data);
        assert_eq!(units[0].unit_type(CodecType::H265), Some(H265_VPS));
        assert_eq!(units[1].unit_type(CodecType::H265), Some(H265_SPS));
    }

    #[test]
    fn no_start_code() {
        assert!(split_annex_b(&[1, 2, 3, 4]).is_empty());
        assert!(split_annex_b(&[]).is_empty());
    }

    #[test]
    fn trailing_start_code_only_is_skipped() {
        let data = [0, 0, 1, 0x67, 0, 0, 1];
        assert_eq!(split_annex_b(&data).len(), 1);
    }
}
