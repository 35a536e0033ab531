//! FNV-1 hashing of names into resource keys and string table keys
//!
//! Strings are lowercased first, and each UTF-16 code unit is folded in as
//! one step, so plain ASCII hashes the same as its bytes would.

const FNV32_OFFSET: u32 = 0x811C_9DC5;
const FNV32_PRIME: u32 = 0x0100_0193;
const FNV64_OFFSET: u64 = 0xCBF2_9CE4_8422_2325;
const FNV64_PRIME: u64 = 0x0000_0100_0000_01B3;

/// 32-bit FNV-1 hash, ignoring case
#[must_use]
pub fn fnv32(value: &str) -> u32 {
    value
        .to_lowercase()
        .encode_utf16()
        .fold(FNV32_OFFSET, |hash, unit| {
            hash.wrapping_mul(FNV32_PRIME) ^ u32::from(unit)
        })
}

/// 64-bit FNV-1 hash, ignoring case
#[must_use]
pub fn fnv64(value: &str) -> u64 {
    value
        .to_lowercase()
        .encode_utf16()
        .fold(FNV64_OFFSET, |hash, unit| {
            hash.wrapping_mul(FNV64_PRIME) ^ u64::from(unit)
        })
}

/// 24-bit hash, xor-folded from [`fnv32`]
#[must_use]
pub fn fnv24(value: &str) -> u32 {
    fnv32_to_24(fnv32(value))
}

/// 56-bit hash, xor-folded from [`fnv64`]
#[must_use]
pub fn fnv56(value: &str) -> u64 {
    fnv64_to_56(fnv64(value))
}

/// Folds a 32-bit hash down to 24 bits
#[must_use]
pub fn fnv32_to_24(hash: u32) -> u32 {
    (hash >> 24) ^ (hash & 0x00FF_FFFF)
}

/// Folds a 64-bit hash down to 56 bits
#[must_use]
pub fn fnv64_to_56(hash: u64) -> u64 {
    (hash >> 56) ^ (hash & 0x00FF_FFFF_FFFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv32() {
        assert_eq!(fnv32(""), 0x811C_9DC5);
        assert_eq!(fnv32("this is a string"), 1_103_314_317);
        assert_eq!(fnv32("Hé110 : wør!D"), 2_133_112_078);
        assert_eq!(fnv32("hello world"), fnv32("HELLO WORLD"));
    }

    #[test]
    fn test_fnv64() {
        assert_eq!(fnv64(""), 0xCBF2_9CE4_8422_2325);
        assert_eq!(fnv64("this is a string"), 4_440_559_991_801_161_453);
        assert_eq!(fnv64("Hé110 : wør!D"), 17_661_114_212_433_175_598);
        assert_eq!(fnv64("hello world"), fnv64("HELLO WORLD"));
    }

    #[test]
    fn test_folded_hashes() {
        assert_eq!(fnv24(""), 0x001C_9D44);
        assert_eq!(fnv24("Hé110 : wør!D"), 2_405_745);
        assert_eq!(fnv56(""), 0x00F2_9CE4_8422_23EE);
        assert_eq!(fnv56("this is a string"), 45_046_755_487_557_328);
        assert_eq!(fnv32_to_24(2_166_136_261), 1_875_268);
        assert_eq!(fnv64_to_56(14_695_981_039_346_656_037), 68_289_449_647_285_230);
    }
}
