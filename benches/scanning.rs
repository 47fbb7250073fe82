//! Benchmarks for marker scanning and key allocation.
//!
//! Run with: cargo bench

use std::hint::black_box;
use std::io::{self, Write};

use criterion::{Criterion, Throughput, criterion_group, criterion_main};

use pagemodel::{Element, ElementContext, IdAllocator, MarkerWriter, Node, NullContext, push_marker};

/// A node whose body has `elements` markers spread through plain markup.
fn sample_node(elements: usize) -> (Node, Vec<u8>) {
    let mut alloc = IdAllocator::new();
    let node = Node::new();
    let mut body = String::new();
    for i in 0..elements {
        body.push_str("<p>Lorem ipsum dolor sit amet, <em>consectetur</em> adipiscing elit.</p>\n");
        let key = node
            .add_child_element(
                &mut alloc,
                Element::heading(format!("Section {i}")),
                |out: &mut dyn Write, _: &dyn ElementContext| -> io::Result<()> {
                    out.write_all(b"<h2>Section</h2>")
                },
            )
            .unwrap();
        push_marker(key, &mut body);
    }
    body.push_str("<p>The end.</p>");
    (node, body.into_bytes())
}

fn scan(node: &Node, body: &[u8], chunk: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    {
        let mut writer = MarkerWriter::new(node, &mut out, &NullContext);
        for part in body.chunks(chunk) {
            writer.write_all(part).unwrap();
        }
        writer.finish().unwrap();
    }
    out
}

// ============================================================================
// Scanning Benchmarks
// ============================================================================

fn bench_scan(c: &mut Criterion) {
    let (node, body) = sample_node(200);
    let mut group = c.benchmark_group("scan");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("whole_body", |b| {
        b.iter(|| scan(&node, black_box(&body), body.len()));
    });
    group.bench_function("chunks_of_64", |b| {
        b.iter(|| scan(&node, black_box(&body), 64));
    });
    group.bench_function("byte_at_a_time", |b| {
        b.iter(|| scan(&node, black_box(&body), 1));
    });
    group.finish();
}

fn bench_plain_text(c: &mut Criterion) {
    let node = Node::new();
    let body = "No markers here, only <b>tags</b> and text. ".repeat(1000).into_bytes();
    let mut group = c.benchmark_group("scan");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("plain_text", |b| {
        b.iter(|| scan(&node, black_box(&body), 4096));
    });
    group.finish();
}

// ============================================================================
// Allocation Benchmarks
// ============================================================================

fn bench_allocate(c: &mut Criterion) {
    c.bench_function("add_child_element", |b| {
        let mut alloc = IdAllocator::new();
        b.iter(|| {
            let node = Node::new();
            for _ in 0..100 {
                node.add_child_element(
                    &mut alloc,
                    Element::heading("x"),
                    |_: &mut dyn Write, _: &dyn ElementContext| -> io::Result<()> { Ok(()) },
                )
                .unwrap();
            }
            node
        });
    });
}

criterion_group!(benches, bench_scan, bench_plain_text, bench_allocate);
criterion_main!(benches);
