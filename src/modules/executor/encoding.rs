//! Console code page decoding

use encoding_rs::Encoding;
use tracing::debug;

/// Map a Windows console code page to its decoder.
pub fn encoding_for_code_page(code_page: u16) -> Option<&'static Encoding> {
    let encoding = match code_page {
        65001 => encoding_rs::UTF_8,
        936 => encoding_rs::GBK,
        950 => encoding_rs::BIG5,
        932 => encoding_rs::SHIFT_JIS,
        949 => encoding_rs::EUC_KR,
        866 => encoding_rs::IBM866,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1252 => encoding_rs::WINDOWS_1252,
        _ => return None,
    };
    Some(encoding)
}

/// Decode captured output. Without a code page, or with one we cannot map,
/// the bytes are read as lossy UTF-8.
pub fn decode_output(bytes: &[u8], code_page: Option<u16>) -> String {
    let Some(code_page) = code_page else {
        return String::from_utf8_lossy(bytes).into_owned();
    };

    match encoding_for_code_page(code_page) {
        Some(encoding) => {
            let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
            if had_errors {
                debug!("Output contained bytes invalid for code page {}", code_page);
            }
            text.into_owned()
        }
        None => {
            debug!("No decoder for code page {}, using UTF-8", code_page);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_gbk() {
        // "状态" in GBK
        let bytes = [0xD7, 0xB4, 0xCC, 0xAC];
        assert_eq!(decode_output(&bytes, Some(936)), "状态");
    }

    #[test]
    fn test_decode_utf8_default() {
        assert_eq!(decode_output("Ok.".as_bytes(), None), "Ok.");
        assert_eq!(decode_output("状态".as_bytes(), Some(65001)), "状态");
    }

    #[test]
    fn test_unknown_code_page_falls_back() {
        assert_eq!(decode_output(b"plain", Some(437)), "plain");
    }
}
