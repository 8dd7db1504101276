//! Helpers shared by the integration tests

#![allow(dead_code)]

use gf16_field::{BinaryFieldElement, Gf16};
use gf16_mul::{available_methods, AlignedBuffer, Galois16Mul, MethodHint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One multiplier per method the host supports
pub fn multipliers() -> Vec<Galois16Mul> {
    init_tracing();
    available_methods(true)
        .into_iter()
        .map(|id| {
            let gf = Galois16Mul::new(MethodHint::Method(id));
            assert_eq!(gf.method(), id, "supported method was not bound");
            gf
        })
        .collect()
}

pub fn reference(v: u16, coeff: u16) -> u16 {
    Gf16::from_value(v).mul(&Gf16::from_value(coeff)).value()
}

pub fn reference_pow(coeff: u16, exp: u64) -> u16 {
    Gf16::from_value(coeff).pow(exp).value()
}

pub fn random_elements(n: usize, seed: u64) -> Vec<u16> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen()).collect()
}

pub fn to_bytes(elems: &[u16]) -> Vec<u8> {
    elems.iter().flat_map(|e| e.to_le_bytes()).collect()
}

/// Prepared, aligned copy of `elems`
pub fn load(gf: &Galois16Mul, elems: &[u16]) -> AlignedBuffer {
    let raw = to_bytes(elems);
    let mut buf = AlignedBuffer::zeroed(gf.prepared_len(raw.len()), gf.info().alignment);
    gf.prepare(&mut buf, &raw);
    buf
}

/// Zeroed working buffer big enough for `n` elements
pub fn scratch_region(gf: &Galois16Mul, n: usize) -> AlignedBuffer {
    AlignedBuffer::zeroed(gf.prepared_len(2 * n), gf.info().alignment)
}

/// First `n` elements of a prepared buffer, in raw order
pub fn unload(gf: &Galois16Mul, buf: &AlignedBuffer, n: usize) -> Vec<u16> {
    let mut copy = buf.clone();
    gf.finish(&mut copy);
    copy.as_u16()[..n].iter().map(|&v| u16::from_le(v)).collect()
}
