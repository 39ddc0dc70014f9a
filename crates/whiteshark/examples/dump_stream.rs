//! Simple decoder to inspect WhiteShark streams.
//!
//! Usage: `dump_stream [PATH] [IDENTIFIER]`. Without a path a demo stream
//! is encoded with objects written as generics and dumped instead.

use std::fs::File;
use std::io::Cursor;

use whiteshark::{
    ClassSchema, Deserializer, Object, Options, Progress, SchemaRegistry, Serializer, Value,
};

fn format_scalar(v: &Value) -> String {
    match v {
        Value::String(s) => {
            let preview: String = s.chars().take(80).collect();
            if s.chars().count() > 80 {
                format!("\"{}...\"", preview)
            } else {
                format!("\"{}\"", preview)
            }
        }
        Value::Char(c) => match char::from_u32(u32::from(*c)) {
            Some(ch) => format!("'{}'", ch.escape_default()),
            None => format!("CHAR(0x{:04x})", c),
        },
        Value::Int8(n) => format!("{}i8", n),
        Value::Int16(n) => format!("{}i16", n),
        Value::Int32(n) => format!("{}", n),
        Value::Int64(n) => format!("{}i64", n),
        Value::Float32(x) => format!("{}f32", x),
        Value::Float64(x) => format!("{:.6}", x),
        Value::Bool(b) => format!("{}", b),
        Value::Null => "null".to_string(),
        other => format!("<{}>", other.kind_name()),
    }
}

fn dump(label: &str, v: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match v {
        Value::Array(array) => {
            println!("{}{}{}[{}]", pad, label, array.element_type, array.len());
            for (i, item) in array.items.iter().take(20).enumerate() {
                dump(&format!("[{}] ", i), item, indent + 1);
            }
            if array.len() > 20 {
                println!("{}  ... and {} more", pad, array.len() - 20);
            }
        }
        Value::Object(object) => {
            println!("{}{}{} {{", pad, label, object.class);
            for (name, field) in &object.fields {
                dump(&format!("{}: ", name), field, indent + 1);
            }
            for (key, entry) in &object.entries {
                dump(&format!("<{}> => ", key), entry, indent + 1);
            }
            for item in &object.items {
                dump("+ ", item, indent + 1);
            }
            println!("{}}}", pad);
        }
        Value::Generic(generic) => {
            println!("{}{}{{", pad, label);
            for (name, field) in generic.iter() {
                dump(&format!("{}: ", name), field, indent + 1);
            }
            println!("{}}}", pad);
        }
        scalar => println!("{}{}{}", pad, label, format_scalar(scalar)),
    }
}

fn demo_stream() -> Vec<u8> {
    let registry = SchemaRegistry::new().with(
        ClassSchema::new("Track")
            .field("title", Value::Null)
            .field("seconds", 0i32)
            .as_map(),
    );
    let track = Object::new("Track")
        .with("title", "Hammerhead")
        .with("seconds", 214)
        .with_entry("genre", "surf");
    Serializer::new(&registry)
        .with_options(Options::new().with_objects_as_generics(true))
        .to_vec("DEMO", &Value::Object(track))
        .expect("Failed to encode demo stream")
}

fn main() {
    let mut args = std::env::args().skip(1);
    let path = args.next();
    let identifier = args.next().unwrap_or_else(|| "DEMO".to_string());

    let registry = SchemaRegistry::new();
    let mut decoder = Deserializer::new(&registry).progressive(&identifier);

    let mut reads = 0usize;
    let mut drive = |mut source: &mut dyn std::io::Read| loop {
        reads += 1;
        match decoder.read_from(&mut source).expect("Failed to decode") {
            Progress::Complete => break,
            Progress::NeedMore => continue,
        }
    };

    match &path {
        Some(path) => {
            println!("Reading: {}", path);
            let mut file = File::open(path).expect("Failed to open file");
            drive(&mut file);
        }
        None => {
            println!("Reading: built-in demo stream");
            drive(&mut Cursor::new(demo_stream()));
        }
    }

    println!("Stream size: {} bytes in {} reads", decoder.bytes_consumed(), reads);
    println!(
        "Dictionaries: {} classes, {} properties",
        decoder.class_dictionary().len(),
        decoder.property_dictionary().len()
    );

    let value = decoder.finish().expect("Stream ended early");
    println!("\n=== Value ===");
    dump("", &value, 0);
}
