use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use prost::Message;
use protopick::{DecodePool, Def, LazyDecoder, Mode};

#[derive(Clone, PartialEq, prost::Message)]
pub struct Event {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub kind: String,
    #[prost(message, optional, tag = "3")]
    pub source: Option<Source>,
    #[prost(bytes = "vec", tag = "4")]
    pub payload: Vec<u8>,
    #[prost(string, repeated, tag = "5")]
    pub labels: Vec<String>,
    #[prost(sint64, repeated, tag = "6")]
    pub samples: Vec<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Source {
    #[prost(string, tag = "1")]
    pub host: String,
    #[prost(uint32, tag = "2")]
    pub port: u32,
    #[prost(string, tag = "3")]
    pub region: String,
}

fn event() -> Vec<u8> {
    Event {
        id: 0xfeed_beef,
        kind: "request".into(),
        source: Some(Source {
            host: "10.0.0.12".into(),
            port: 8443,
            region: "eu-west".into(),
        }),
        payload: vec![0xab; 1024],
        labels: (0..16).map(|i| format!("label-{i}")).collect(),
        samples: (-64..64).collect(),
    }
    .encode_to_vec()
}

fn selection() -> Def {
    let mut def = Def::new([1, 2]);
    def.nested(3, [2]);
    def
}

fn selective_decoding(c: &mut Criterion) {
    let data = event();

    let mut group = c.benchmark_group("selective");
    group.bench_with_input(BenchmarkId::new("prost", data.len()), &data, |b, data| {
        b.iter(|| {
            let event = Event::decode(&data[..]).unwrap();
            std::hint::black_box(event.source.map(|source| source.port))
        })
    });

    for mode in [Mode::Safe, Mode::Fast] {
        let decoder = LazyDecoder::new(selection()).unwrap().with_mode(mode);
        group.bench_with_input(
            BenchmarkId::new(format!("protopick {mode:?}"), data.len()),
            &data,
            |b, data| {
                b.iter(|| {
                    let result = decoder.decode(data).unwrap();
                    std::hint::black_box(result.field_data(&[3, 2]).unwrap().uint32_value())
                })
            },
        );

        let pool = DecodePool::new();
        group.bench_with_input(
            BenchmarkId::new(format!("protopick {mode:?} pooled"), data.len()),
            &data,
            |b, data| {
                b.iter(|| {
                    let result = decoder.decode_in(data, &pool).unwrap();
                    std::hint::black_box(result.field_data(&[3, 2]).unwrap().uint32_value())
                })
            },
        );
    }
}

criterion_group!(decoding, selective_decoding);

criterion_main!(decoding);
