use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <input-fbx> <output-fbx> [--ascii]", args[0]);
        eprintln!("  Converts between the binary and ASCII FBX encodings.");
        eprintln!("  The input format is detected; the output is binary unless --ascii is given.");
        std::process::exit(1);
    }

    let input = &args[1];
    let output = &args[2];
    let to_ascii = args.iter().any(|arg| arg == "--ascii");

    let binary_input = match fbx_io::fbx::is_binary(input) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("ERROR: Cannot open {}: {}", input, e);
            std::process::exit(1);
        }
    };

    println!(
        "Reading {} FBX file: {}",
        if binary_input { "binary" } else { "ASCII" },
        input
    );
    let document = match if binary_input {
        fbx_io::read_binary(input)
    } else {
        fbx_io::read_ascii(input)
    } {
        Ok(document) => document,
        Err(e) => {
            eprintln!("ERROR: Failed to read {}", input);
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "  Version: {}, top-level nodes: {}",
        document.version.as_u32(),
        document.nodes.len()
    );
    for node in document.nodes.iter().take(10) {
        println!(
            "  {}: {} properties, {} children",
            node.name,
            node.properties.len(),
            node.children.len()
        );
    }
    if document.nodes.len() > 10 {
        println!("  ... and {} more", document.nodes.len() - 10);
    }

    let result = if to_ascii {
        fbx_io::write_ascii(&document, output)
    } else {
        fbx_io::write_binary(&document, output)
    };
    match result {
        Ok(()) => println!(
            "Wrote {} FBX file: {}",
            if to_ascii { "ASCII" } else { "binary" },
            output
        ),
        Err(e) => {
            eprintln!("ERROR: Failed to write {}", output);
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
