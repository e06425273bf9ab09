//! Export throughput for the local formats.
//!
//! Run with: `cargo bench -p mesh-io`

#![allow(missing_docs, clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mesh_io::{parse_stl, stl_bytes, write_obj, write_ply_binary};
use mesh_types::{IndexedMesh, Point3};

/// Wavy height field with `n * n` quads, roughly what a table-top scan
/// decimates down to.
fn height_field(n: u32) -> IndexedMesh {
    let mut mesh = IndexedMesh::with_capacity(((n + 1) * (n + 1)) as usize, (2 * n * n) as usize);
    let step = 1.0 / n as f32;
    for j in 0..=n {
        for i in 0..=n {
            let (x, y) = (i as f32 * step, j as f32 * step);
            let z = 0.05 * (x * 12.0).sin() * (y * 9.0).cos();
            mesh.vertices.push(Point3::new(x, y, z));
        }
    }
    let row = n + 1;
    for j in 0..n {
        for i in 0..n {
            let a = j * row + i;
            mesh.faces.push([a, a + 1, a + row + 1]);
            mesh.faces.push([a, a + row + 1, a + row]);
        }
    }
    mesh
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");

    for n in [32u32, 128, 256] {
        let mesh = height_field(n);
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));

        group.bench_with_input(BenchmarkId::new("stl", n), &mesh, |b, mesh| {
            b.iter(|| stl_bytes(black_box(mesh)));
        });

        group.bench_with_input(BenchmarkId::new("obj", n), &mesh, |b, mesh| {
            b.iter(|| {
                let mut out = Vec::new();
                write_obj(black_box(mesh), &mut out).map(|()| out)
            });
        });

        group.bench_with_input(BenchmarkId::new("ply_binary", n), &mesh, |b, mesh| {
            b.iter(|| {
                let mut out = Vec::new();
                write_ply_binary(black_box(mesh), &mut out).map(|()| out)
            });
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for n in [32u32, 128, 256] {
        let mesh = height_field(n);
        let Ok(bytes) = stl_bytes(&mesh) else {
            continue;
        };
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("stl", n), &bytes, |b, bytes| {
            b.iter(|| parse_stl(black_box(bytes)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_export, bench_parse);
criterion_main!(benches);
