use std::io::{self, Read, Seek, SeekFrom};

pub struct LittleEndianReader<R> {
    inner: R,
}

impl<R: Read + Seek> LittleEndianReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a null-terminated string, consuming at most `max_len` bytes.
    /// The terminator is consumed; running out of budget before it is an error.
    pub fn read_null_terminated_string(&mut self, max_len: usize) -> io::Result<String> {
        let mut bytes = Vec::with_capacity(max_len);
        for _ in 0..max_len {
            let b = self.read_u8()?;
            if b == 0 {
                return String::from_utf8(bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
            }
            bytes.push(b);
        }
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("string not terminated within {max_len} bytes"),
        ))
    }

    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Current(n as i64))?;
        Ok(())
    }

    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    pub fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn len(&mut self) -> io::Result<u64> {
        let cur = self.position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(cur))?;
        Ok(end)
    }
}
