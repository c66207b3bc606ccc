/// One file to be written into the volume.
#[derive(Clone, PartialEq, Eq)]
pub struct MountedFile {
    pub path: String,
    pub contents: Vec<u8>,
    pub mode: i32,
}

impl std::fmt::Debug for MountedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedFile")
            .field("path", &self.path)
            .field("contents", &format_args!("[{} bytes]", self.contents.len()))
            .field("mode", &self.mode)
            .finish()
    }
}

/// Remote identity of a mounted secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretVersion {
    pub id: String,
    pub version: String,
}

/// Result of a mount. `files[i]` and `versions[i]` describe the same secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOutcome {
    pub files: Vec<MountedFile>,
    pub versions: Vec<SecretVersion>,
}
