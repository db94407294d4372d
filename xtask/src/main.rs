// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tlvinfo::backend::{Backend, Backends};
use tlvinfo::bsp::Bsp;
use tlvinfo::table::Listing;
use tlvinfo::{BackendError, StoreConfig, TlvStore};

/// Host-side tool for TlvInfo images, e.g. ones destined for an EEPROM
/// programmer or for `dd` onto a boot device.
#[derive(Debug, Parser)]
enum Xtask {
    /// Writes a new image holding only the given records
    Create {
        #[clap(long, value_enum, default_value_t = Board::K1x)]
        board: Board,
        /// Records to add, as CODE=VALUE (e.g. 0x23=SN0001)
        #[clap(long = "set", value_parser = parse_assignment)]
        records: Vec<(u8, String)>,
        out: PathBuf,
    },
    /// Lists the records in an image
    Show {
        #[clap(long, value_enum, default_value_t = Board::K1x)]
        board: Board,
        image: PathBuf,
    },
    /// Hex dump of the image bytes
    Dump {
        #[clap(long, value_enum, default_value_t = Board::K1x)]
        board: Board,
        image: PathBuf,
    },
    /// Sets a record, or deletes it if no value is given
    Set {
        #[clap(long, value_enum, default_value_t = Board::K1x)]
        board: Board,
        image: PathBuf,
        #[clap(value_parser = parse_code)]
        code: u8,
        value: Option<String>,
    },
    /// Replaces the image with an empty one
    Erase {
        #[clap(long, value_enum, default_value_t = Board::K1x)]
        board: Board,
        image: PathBuf,
    },
    /// Lists the type codes we know names for
    Codes,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Board {
    K1x,
    Generic,
}

const K1X_CAPACITY: usize = <tlvinfo::bsp::k1x::Board as Bsp>::CAPACITY;
const GENERIC_CAPACITY: usize = <tlvinfo::bsp::generic::Board as Bsp>::CAPACITY;

impl Board {
    fn capacity(self) -> usize {
        match self {
            Board::K1x => K1X_CAPACITY,
            Board::Generic => GENERIC_CAPACITY,
        }
    }
}

fn parse_code(s: &str) -> Result<u8> {
    let code = tlvinfo::value::parse_number(s).map_err(|_| anyhow!("bad type code {:?}", s))?;
    u8::try_from(code).map_err(|_| anyhow!("type code {} doesn't fit in a byte", s))
}

fn parse_assignment(s: &str) -> Result<(u8, String)> {
    let (code, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected CODE=VALUE, got {:?}", s))?;
    Ok((parse_code(code)?, value.to_string()))
}

/// An image file, held in memory and written back on `save`. Reads past the
/// end of the file see zeros.
struct ImageFile {
    path: PathBuf,
    data: Vec<u8>,
    dirty: bool,
}

impl ImageFile {
    fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            data,
            dirty: false,
        })
    }

    fn blank(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            data: Vec::new(),
            dirty: false,
        }
    }

    fn save(&self) -> Result<()> {
        if self.dirty {
            std::fs::write(&self.path, &self.data)
                .with_context(|| format!("writing {}", self.path.display()))?;
            log::info!("saved {} ({} bytes)", self.path.display(), self.data.len());
        }
        Ok(())
    }
}

impl Backend for ImageFile {
    fn name(&self) -> &'static str {
        "image file"
    }

    fn probe(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, BackendError> {
        buf.fill(0);
        if let Some(src) = self.data.get(offset..) {
            let n = src.len().min(buf.len());
            buf[..n].copy_from_slice(&src[..n]);
        }
        Ok(buf.len())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize, BackendError> {
        let end = offset + data.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(data);
        self.dirty = true;
        Ok(data.len())
    }
}

/// Runs `f` against a store backed by `image`, then flushes and saves.
fn edit<const N: usize>(
    image: &mut ImageFile,
    f: impl FnOnce(&mut TlvStore<'_, N>) -> tlvinfo::Result<()>,
) -> Result<()> {
    {
        let backends = Backends::new().with(&mut *image)?;
        let mut store: TlvStore<'_, N> = TlvStore::new(backends, StoreConfig::default());
        f(&mut store)?;
        store.flush()?;
    }
    image.save()
}

fn edit_for(
    board: Board,
    image: &mut ImageFile,
    f: impl FnOnce(&mut dyn Editor) -> tlvinfo::Result<()>,
) -> Result<()> {
    match board {
        Board::K1x => edit::<K1X_CAPACITY>(image, |store| f(store)),
        Board::Generic => edit::<GENERIC_CAPACITY>(image, |store| f(store)),
    }
}

/// The store operations the tool needs, without the buffer size.
trait Editor {
    fn set_str(&mut self, code: u8, value: Option<&str>) -> tlvinfo::Result<()>;
    fn erase(&mut self) -> tlvinfo::Result<()>;
}

impl<const N: usize> Editor for TlvStore<'_, N> {
    fn set_str(&mut self, code: u8, value: Option<&str>) -> tlvinfo::Result<()> {
        TlvStore::set_str(self, code, value)
    }

    fn erase(&mut self) -> tlvinfo::Result<()> {
        TlvStore::erase(self)
    }
}

fn create(board: Board, records: &[(u8, String)], out: &Path) -> Result<()> {
    let mut image = ImageFile::blank(out);
    edit_for(board, &mut image, |store| {
        for (code, value) in records {
            store.set_str(*code, Some(value))?;
        }
        Ok(())
    })
}

fn set(board: Board, path: &Path, code: u8, value: Option<&str>) -> Result<()> {
    let mut image = ImageFile::open(path)?;
    edit_for(board, &mut image, |store| store.set_str(code, value))
        .with_context(|| format!("setting code 0x{:02x}", code))
}

fn erase(board: Board, path: &Path) -> Result<()> {
    let mut image = ImageFile::open(path)?;
    edit_for(board, &mut image, |store| store.erase())
}

/// The part of an image file the board would actually load.
fn loaded_bytes(board: Board, path: &Path) -> Result<Vec<u8>> {
    let mut data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    data.resize(board.capacity(), 0);
    Ok(data)
}

fn show(board: Board, path: &Path) -> Result<String> {
    let data = loaded_bytes(board, path)?;
    Ok(Listing(&data).to_string())
}

fn dump(board: Board, path: &Path) -> Result<String> {
    let data = loaded_bytes(board, path)?;
    let mut out = format!("TLV data dump: (0x{:x} bytes)\n", data.len());
    for (i, line) in data.chunks(16).enumerate() {
        out.push_str(&format!("{:04X}:", i * 16));
        for b in line {
            out.push_str(&format!(" {:02X}", b));
        }
        out.push('\n');
    }
    Ok(out)
}

fn codes() -> String {
    let mut out = String::from("TLV Code    TLV Name\n========    =================\n");
    for &code in tlvinfo::code::ALL {
        out.push_str(&format!("0x{:02X}        {}\n", u8::from(code), code.name()));
    }
    out
}

fn main() -> Result<()> {
    env_logger::init();
    let xtask = Xtask::parse();

    match xtask {
        Xtask::Create {
            board,
            records,
            out,
        } => create(board, &records, &out)?,
        Xtask::Show { board, image } => print!("{}", show(board, &image)?),
        Xtask::Dump { board, image } => print!("{}", dump(board, &image)?),
        Xtask::Set {
            board,
            image,
            code,
            value,
        } => set(board, &image, code, value.as_deref())?,
        Xtask::Erase { board, image } => erase(board, &image)?,
        Xtask::Codes => print!("{}", codes()),
    }
    Ok(())
}
