//! Basic usage example for rezip

use rezip::{Mode, ZipArchive};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== rezip Basic Example ===\n");

    let dir = tempfile::tempdir()?;
    let zip_path = dir.path().join("test.zip");

    // Create a ZIP file
    println!("Creating test.zip...");
    let mut zip = ZipArchive::open(&zip_path, Mode::Write)?;
    zip.entry_from_bytes("hello.txt", b"Hello, rezip!".to_vec())?;
    zip.folder_entry("folder")?;
    zip.entry_from_bytes("folder/nested.txt", b"This is a nested file.".to_vec())?;
    zip.entry_from_bytes("data.txt", b"Line 1\nLine 2\nLine 3\n".to_vec())?;
    zip.close()?;
    println!("✓ Created test.zip\n");

    // Read the ZIP file
    println!("Reading test.zip...");
    let zip = ZipArchive::open(&zip_path, Mode::Read)?;

    println!("Entries in ZIP:");
    for entry in zip.entries()? {
        println!(
            "  - {} ({} bytes, {} compressed)",
            entry.name(),
            entry.uncompressed_size(),
            entry.compressed_size()
        );
    }
    println!();

    println!("Reading hello.txt:");
    println!("  Content: {}", zip.entry("hello.txt")?.read_to_string()?);
    println!();

    // Edit it: nothing is written until close
    println!("Replacing hello.txt, removing data.txt...");
    let mut zip = ZipArchive::open(&zip_path, Mode::Append)?;
    zip.entry_from_bytes("hello.txt", b"Hello again!".to_vec())?;
    zip.delete_entries(["data.txt"])?;
    zip.close()?;

    let zip = ZipArchive::open(&zip_path, Mode::Read)?;
    println!("  hello.txt: {}", zip.entry("hello.txt")?.read_to_string()?);
    println!("  entries left: {}", zip.len());

    // Extract everything
    let out = dir.path().join("extracted");
    zip.extract_to(&out)?;
    println!("✓ Extracted to {}", out.display());

    println!("✓ All done!");

    Ok(())
}
