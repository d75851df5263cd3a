// Signing and recovery benchmarks for the Sable transaction layer.
//
// Covers secp256k1 keypair generation, raw hash signing and recovery,
// transaction signing with and without replay protection, wire decoding
// plus sender recovery at various payload sizes, and personal messages.

use alloy_primitives::{Address, Bytes, B256, U256};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use sable_protocol::config::CHAIN_ID_DEVNET;
use sable_protocol::crypto::{keccak256, recover_personal, sign_personal, Keypair};
use sable_protocol::transaction::{recover_sender, sign_transaction, Category, Transaction, TransactionBuilder};

fn transfer(data_len: usize) -> Transaction {
    TransactionBuilder::new(Category::NORMAL)
        .nonce(42)
        .gas_price(U256::from(18_000_000_000u64))
        .gas(90_000)
        .to(Address::repeat_byte(0xb0))
        .value(U256::from(1_000_000u64))
        .data(vec![0xab; data_len])
        .build()
}

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("secp256k1/keypair_generate", |b| {
        b.iter(Keypair::generate);
    });
}

fn bench_sign_hash(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let hash: B256 = keccak256(b"transfer 500 from alice to bob; nonce=42");

    c.bench_function("secp256k1/sign_hash", |b| {
        b.iter(|| keypair.sign_hash(&hash).unwrap());
    });
}

fn bench_recover(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let hash: B256 = keccak256(b"transfer 500 from alice to bob; nonce=42");
    let signature = keypair.sign_hash(&hash).unwrap();

    c.bench_function("secp256k1/recover", |b| {
        b.iter(|| signature.recover(&hash).unwrap());
    });
}

fn bench_sign_transaction(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let mut group = c.benchmark_group("transaction/sign");

    group.bench_function("legacy", |b| {
        b.iter(|| sign_transaction(transfer(0), &keypair, None).unwrap());
    });
    group.bench_function("replay_protected", |b| {
        b.iter(|| sign_transaction(transfer(0), &keypair, Some(CHAIN_ID_DEVNET)).unwrap());
    });

    group.finish();
}

fn bench_decode_and_recover(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let mut group = c.benchmark_group("transaction/decode_recover");

    for size in [0usize, 256, 4_096, 65_536] {
        let signed = sign_transaction(transfer(size), &keypair, Some(CHAIN_ID_DEVNET)).unwrap();
        let raw: Bytes = signed.encode_wire();

        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &raw, |b, raw| {
            b.iter(|| {
                let tx = Transaction::decode_wire(raw).unwrap();
                recover_sender(&tx).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_personal_message(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let message = b"log in to sable devnet";
    let signature = sign_personal(&keypair, message).unwrap();

    c.bench_function("personal/sign", |b| {
        b.iter(|| sign_personal(&keypair, message).unwrap());
    });
    c.bench_function("personal/recover", |b| {
        b.iter(|| recover_personal(message, &signature).unwrap());
    });
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_sign_hash,
    bench_recover,
    bench_sign_transaction,
    bench_decode_and_recover,
    bench_personal_message,
);
criterion_main!(benches);
