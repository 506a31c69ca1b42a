use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dwrf2::encoding::byte_rle::{boolean_rle_decoder, boolean_rle_encoder, Encoder, EncodingKey, Ranges};
use dwrf2::error::Result;
use dwrf2::stream::{BufferedOutputStream, SeekableArrayInputStream};

fn bit(data: &[u8], i: usize) -> bool {
    data[i / 8] & (1 << (i % 8)) != 0
}

fn encode(values: &[bool], nulls: Option<&[u8]>) -> Result<Vec<u8>> {
    let bytes_in = values.iter().map(|&value| value as u8).collect::<Vec<_>>();
    let mut bytes = Vec::new();
    let mut encoder = boolean_rle_encoder(BufferedOutputStream::new(&mut bytes));
    encoder.add(&bytes_in, &Ranges::of(0, values.len()), nulls)?;
    encoder.flush()?;
    drop(encoder);
    Ok(bytes)
}

fn decode(bytes: Vec<u8>, num_values: usize, nulls: Option<&[u8]>) -> Result<Vec<u8>> {
    let input = SeekableArrayInputStream::with_block_size(bytes, 5);
    let mut decoder = boolean_rle_decoder(input, EncodingKey::new(1, 0));
    let mut data = vec![0u8; (num_values + 7) / 8];
    decoder.next(&mut data, num_values, nulls)?;
    Ok(data)
}

#[test]
fn nine_alternating_bits() -> Result<()> {
    let values = [true, false, true, false, true, false, true, false, true];
    let encoded = encode(&values, None)?;
    // one literal segment of the two packed bytes
    assert_eq!(encoded, vec![0xFE, 0xAA, 0x80]);

    let decoded = decode(encoded, values.len(), None)?;
    for (i, &value) in values.iter().enumerate() {
        assert_eq!(bit(&decoded, i), value, "bit {}", i);
    }
    // the first value written lands at bit 0 of the first decoded byte
    assert_eq!(decoded[0] & 1, 1);
    Ok(())
}

#[test]
fn round_trip_dense() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(21);
    for &len in &[1usize, 7, 8, 9, 64, 65, 1000, 10_000] {
        let values = (0..len).map(|_| rng.gen_bool(0.7)).collect::<Vec<_>>();
        let decoded = decode(encode(&values, None)?, len, None)?;
        for (i, &value) in values.iter().enumerate() {
            assert_eq!(bit(&decoded, i), value, "bit {} of {}", i, len);
        }
    }
    Ok(())
}

#[test]
fn long_runs_compress_to_repeats() -> Result<()> {
    // 130 bytes of set bits
    let values = vec![true; 130 * 8];
    let encoded = encode(&values, None)?;
    assert_eq!(encoded, vec![0x7F, 0xFF]);
    let decoded = decode(encoded, values.len(), None)?;
    assert!(values.iter().enumerate().all(|(i, _)| bit(&decoded, i)));
    Ok(())
}

#[test]
fn round_trip_with_nulls() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(3);
    let num_values = 997;
    let values = (0..num_values)
        .map(|_| rng.gen_bool(0.5))
        .collect::<Vec<_>>();
    let mut nulls = vec![0u8; (num_values + 7) / 8];
    for i in 0..num_values {
        if rng.gen_bool(0.4) {
            nulls[i / 8] |= 1 << (i % 8);
        }
    }

    let encoded = encode(&values, Some(&nulls))?;
    let decoded = decode(encoded, num_values, Some(&nulls))?;
    for i in 0..num_values {
        if nulls[i / 8] & (1 << (i % 8)) != 0 {
            assert!(!bit(&decoded, i), "null bit {} is set", i);
        } else {
            assert_eq!(bit(&decoded, i), values[i], "bit {}", i);
        }
    }
    Ok(())
}

#[test]
fn chunked_reads_match_full_reads() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(17);
    let num_values = 1003;
    let values = (0..num_values)
        .map(|_| rng.gen_bool(0.2))
        .collect::<Vec<_>>();
    let encoded = encode(&values, None)?;

    let input = SeekableArrayInputStream::new(encoded);
    let mut decoder = boolean_rle_decoder(input, EncodingKey::new(1, 0));
    let mut offset = 0;
    // uneven chunks leave buffered bits between calls
    for &chunk in &[3usize, 8, 13, 64, 200, 715] {
        let mut data = vec![0u8; (chunk + 7) / 8];
        decoder.next(&mut data, chunk, None)?;
        for i in 0..chunk {
            assert_eq!(bit(&data, i), values[offset + i], "bit {}", offset + i);
        }
        offset += chunk;
    }
    assert_eq!(offset, num_values);
    Ok(())
}

#[test]
fn bits_enter_from_a_bitmap() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(29);
    let num_values = 300;
    let mut source = vec![0u8; (num_values + 7) / 8];
    for i in 0..num_values {
        if rng.gen_bool(0.6) {
            source[i / 8] |= 1 << (i % 8);
        }
    }

    for invert in [false, true] {
        let mut bytes = Vec::new();
        let mut encoder = boolean_rle_encoder(BufferedOutputStream::new(&mut bytes));
        encoder.add_bits(&source, &Ranges::of(0, num_values), None, invert)?;
        encoder.flush()?;
        drop(encoder);

        let decoded = decode(bytes, num_values, None)?;
        for i in 0..num_values {
            assert_eq!(bit(&decoded, i), invert != bit(&source, i), "bit {}", i);
        }
    }
    Ok(())
}

#[test]
fn accessor_bits_match_bitmap_bits() -> Result<()> {
    let source = [0b11001010u8, 0b00000001];
    let num_values = 9;

    let mut from_bitmap = Vec::new();
    let mut encoder = boolean_rle_encoder(BufferedOutputStream::new(&mut from_bitmap));
    encoder.add_bits(&source, &Ranges::of(0, num_values), None, false)?;
    encoder.flush()?;
    drop(encoder);

    let mut from_accessor = Vec::new();
    let mut encoder = boolean_rle_encoder(BufferedOutputStream::new(&mut from_accessor));
    encoder.add_bits_with(&|i| bit(&source, i), &Ranges::of(0, num_values), None, false)?;
    encoder.flush()?;
    drop(encoder);

    assert_eq!(from_bitmap, from_accessor);
    Ok(())
}
