//! Security handlers for encrypted documents
//!
//! Implements the decrypting side of ISO 32000-1 Section 7.6: the Standard
//! password handler (RC4, revisions 2 to 4) and the Adobe.PubSec
//! certificate handler. Key recovery for PubSec recipients is delegated to a
//! caller supplied [`RecipientDecryptor`].

use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult, ReaderProperties};
use bitflags::bitflags;
use std::fmt;

/// Padding used in password processing
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

bitflags! {
    /// User access permissions (the `/P` entry)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u32 {
        const PRINT = 1 << 2;
        const MODIFY = 1 << 3;
        const COPY = 1 << 4;
        const MODIFY_ANNOTATIONS = 1 << 5;
        const FILL_FORMS = 1 << 8;
        const EXTRACT_ACCESSIBILITY = 1 << 9;
        const ASSEMBLE = 1 << 10;
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

/// Decrypts strings and streams of an opened document.
pub trait SecurityHandler: fmt::Debug + Send + Sync {
    fn decrypt_string(&self, data: &[u8], num: u32, gen: u16) -> Vec<u8>;

    fn decrypt_stream(&self, data: &[u8], num: u32, gen: u16) -> Vec<u8>;

    fn permissions(&self) -> Permissions;

    /// True when the owner password (or an all-permission recipient)
    /// opened the document.
    fn opened_with_full_permission(&self) -> bool;
}

/// The file key and permissions recovered for a PubSec recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyMaterial {
    pub file_key: Vec<u8>,
    pub permissions: u32,
}

/// Recovers the file key from the `/Recipients` CMS envelopes.
pub trait RecipientDecryptor: Send + Sync {
    fn decrypt_file_key(
        &self,
        recipients: &[Vec<u8>],
        certificate: &[u8],
        key: &[u8],
        key_length: usize,
    ) -> ParseResult<PublicKeyMaterial>;
}

/// RC4 cipher state
struct Rc4 {
    s: [u8; 256],
    i: usize,
    j: usize,
}

impl Rc4 {
    fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (i, byte) in s.iter_mut().enumerate() {
            *byte = i as u8;
        }

        // Key scheduling algorithm (KSA)
        let mut j = 0usize;
        if !key.is_empty() {
            for i in 0..256 {
                j = (j + s[i] as usize + key[i % key.len()] as usize) % 256;
                s.swap(i, j);
            }
        }

        Self { s, i: 0, j: 0 }
    }

    /// RC4 is symmetric; this both encrypts and decrypts
    fn process(&mut self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .map(|&byte| {
                self.i = (self.i + 1) % 256;
                self.j = (self.j + self.s[self.i] as usize) % 256;
                self.s.swap(self.i, self.j);
                let k = self.s[(self.s[self.i] as usize + self.s[self.j] as usize) % 256];
                byte ^ k
            })
            .collect()
    }
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    Rc4::new(key).process(data)
}

/// Per-object RC4 key (Algorithm 1)
fn object_key(file_key: &[u8], num: u32, gen: u16) -> Vec<u8> {
    let mut data = file_key.to_vec();
    data.extend_from_slice(&num.to_le_bytes()[..3]);
    data.extend_from_slice(&gen.to_le_bytes()[..2]);
    let hash = md5::compute(&data).0;
    hash[..(file_key.len() + 5).min(16)].to_vec()
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

/// Which object kinds the document actually encrypts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CryptScope {
    strings: bool,
    streams: bool,
}

impl CryptScope {
    const ALL: CryptScope = CryptScope {
        strings: true,
        streams: true,
    };

    fn from_dict(encrypt: &PdfDictionary) -> Self {
        let is_identity = |key: &str| encrypt.get_name(key) == Some("Identity");
        Self {
            strings: !is_identity("StrF"),
            streams: !is_identity("StmF"),
        }
    }
}

/// Key length in bytes and the crypt filter method for `/V`
fn key_length(encrypt: &PdfDictionary) -> ParseResult<usize> {
    let length_bits = encrypt.get_integer("Length").unwrap_or(40);
    let bytes = |bits: i64| -> ParseResult<usize> {
        if !(40..=128).contains(&bits) || bits % 8 != 0 {
            return Err(ParseError::EncryptionNotSupported(format!(
                "illegal key length {bits}"
            )));
        }
        Ok((bits / 8) as usize)
    };

    match encrypt.get_integer("V").unwrap_or(0) {
        1 => Ok(5),
        2 => bytes(length_bits),
        4 => {
            let filter_name = encrypt.get_name("StmF").unwrap_or("Identity");
            let method = encrypt
                .get_dict("CF")
                .and_then(|cf| cf.get_dict(filter_name))
                .and_then(|f| f.get_name("CFM"))
                .unwrap_or("None");
            match method {
                "V2" | "None" => {
                    let length = encrypt
                        .get_dict("CF")
                        .and_then(|cf| cf.get_dict(filter_name))
                        .and_then(|f| f.get_integer("Length"))
                        // Crypt filter lengths are in bytes
                        .map(|n| if n <= 16 { n * 8 } else { n })
                        .unwrap_or(128);
                    bytes(length)
                }
                other => Err(ParseError::EncryptionNotSupported(format!(
                    "crypt filter method {other}"
                ))),
            }
        }
        other => Err(ParseError::EncryptionNotSupported(format!(
            "encryption version {other}"
        ))),
    }
}

fn string_bytes<'a>(dict: &'a PdfDictionary, key: &str) -> ParseResult<&'a [u8]> {
    dict.get(key)
        .and_then(PdfObject::as_string)
        .map(|s| s.as_bytes())
        .ok_or_else(|| ParseError::MissingKey(format!("{key} in encryption dictionary")))
}

/// The Standard (password) security handler, RC4 revisions 2 to 4
#[derive(Clone)]
pub struct StandardSecurityHandler {
    file_key: Vec<u8>,
    permissions: Permissions,
    owner_access: bool,
    scope: CryptScope,
}

impl fmt::Debug for StandardSecurityHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardSecurityHandler")
            .field("key_length", &self.file_key.len())
            .field("permissions", &self.permissions)
            .field("owner_access", &self.owner_access)
            .finish()
    }
}

/// The parameters of a Standard encryption dictionary
struct StandardParams<'a> {
    revision: i64,
    key_length: usize,
    owner_entry: &'a [u8],
    user_entry: &'a [u8],
    p: i32,
    id: &'a [u8],
    encrypt_metadata: bool,
}

impl StandardParams<'_> {
    /// Algorithm 2: file key from a (padded) user password
    fn file_key(&self, user_password: &[u8]) -> Vec<u8> {
        let mut data = pad_password(user_password).to_vec();
        data.extend_from_slice(&self.owner_entry[..self.owner_entry.len().min(32)]);
        data.extend_from_slice(&self.p.to_le_bytes());
        data.extend_from_slice(self.id);
        if self.revision >= 4 && !self.encrypt_metadata {
            data.extend_from_slice(&[0xFF; 4]);
        }

        let mut hash = md5::compute(&data).0;
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = md5::compute(&hash[..self.key_length]).0;
            }
        }
        hash[..self.key_length].to_vec()
    }

    /// Algorithms 4 and 5: the `/U` value a file key produces
    fn user_entry_for(&self, file_key: &[u8]) -> Vec<u8> {
        if self.revision == 2 {
            return rc4(file_key, &PADDING);
        }
        let mut data = PADDING.to_vec();
        data.extend_from_slice(self.id);
        let mut result = rc4(file_key, &md5::compute(&data).0);
        for i in 1..=19u8 {
            let key: Vec<u8> = file_key.iter().map(|b| b ^ i).collect();
            result = rc4(&key, &result);
        }
        result
    }

    /// Algorithm 6: the file key if `password` is the user password
    fn authenticate_user(&self, password: &[u8]) -> Option<Vec<u8>> {
        let key = self.file_key(password);
        let expected = self.user_entry_for(&key);
        let compare = if self.revision == 2 { 32 } else { 16 };
        let matches = self.user_entry.len() >= compare
            && expected.len() >= compare
            && expected[..compare] == self.user_entry[..compare];
        matches.then_some(key)
    }

    /// RC4 key derived from the owner password (Algorithm 3 steps a to d)
    fn owner_key(&self, owner_password: &[u8]) -> Vec<u8> {
        let mut hash = md5::compute(pad_password(owner_password)).0;
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = md5::compute(hash).0;
            }
        }
        hash[..self.key_length].to_vec()
    }

    /// Algorithm 7: recover the user password from `/O`
    fn user_password_from_owner(&self, owner_password: &[u8]) -> Vec<u8> {
        let key = self.owner_key(owner_password);
        let entry = &self.owner_entry[..self.owner_entry.len().min(32)];
        if self.revision == 2 {
            return rc4(&key, entry);
        }
        let mut result = entry.to_vec();
        for i in (0..=19u8).rev() {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            result = rc4(&round_key, &result);
        }
        result
    }
}

impl StandardSecurityHandler {
    /// Open a Standard-encrypted document with `password`, trying it as the
    /// owner password first and then as the user password.
    pub fn open(encrypt: &PdfDictionary, id: &[u8], password: &[u8]) -> ParseResult<Self> {
        let revision = encrypt.get_integer("R").unwrap_or(0);
        if !(2..=4).contains(&revision) {
            return Err(ParseError::EncryptionNotSupported(format!(
                "standard security handler revision {revision}"
            )));
        }
        let params = StandardParams {
            revision,
            key_length: key_length(encrypt)?,
            owner_entry: string_bytes(encrypt, "O")?,
            user_entry: string_bytes(encrypt, "U")?,
            p: encrypt
                .get_integer("P")
                .ok_or_else(|| ParseError::MissingKey("P in encryption dictionary".to_string()))?
                as i32,
            id,
            encrypt_metadata: encrypt
                .get("EncryptMetadata")
                .and_then(PdfObject::as_bool)
                .unwrap_or(true),
        };

        let recovered = params.user_password_from_owner(password);
        let (file_key, owner_access) = match params.authenticate_user(&recovered) {
            Some(key) => (key, true),
            None => (
                params
                    .authenticate_user(password)
                    .ok_or(ParseError::InvalidPassword)?,
                false,
            ),
        };

        tracing::debug!(revision, owner_access, "opened standard security handler");
        Ok(Self {
            file_key,
            permissions: Permissions::from_bits_retain(params.p as u32),
            owner_access,
            scope: if revision >= 4 {
                CryptScope::from_dict(encrypt)
            } else {
                CryptScope::ALL
            },
        })
    }

    /// Compute the `/O` entry for a pair of passwords (Algorithm 3).
    pub fn owner_entry(owner_password: &[u8], user_password: &[u8], revision: i64, key_length: usize) -> Vec<u8> {
        let owner = if owner_password.is_empty() {
            user_password
        } else {
            owner_password
        };
        let params = StandardParams {
            revision,
            key_length,
            owner_entry: &[],
            user_entry: &[],
            p: 0,
            id: &[],
            encrypt_metadata: true,
        };
        let key = params.owner_key(owner);
        let mut result = rc4(&key, &pad_password(user_password));
        if revision >= 3 {
            for i in 1..=19u8 {
                let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
                result = rc4(&round_key, &result);
            }
        }
        result
    }

    /// Compute the file key and `/U` entry for a user password (Algorithms 2, 4, 5).
    pub fn user_entry(
        user_password: &[u8],
        owner_entry: &[u8],
        p: i32,
        id: &[u8],
        revision: i64,
        key_length: usize,
    ) -> (Vec<u8>, Vec<u8>) {
        let params = StandardParams {
            revision,
            key_length,
            owner_entry,
            user_entry: &[],
            p,
            id,
            encrypt_metadata: true,
        };
        let key = params.file_key(user_password);
        let mut entry = params.user_entry_for(&key);
        entry.resize(32, 0);
        (key, entry)
    }

    /// Encrypt with the per-object key; RC4 makes this the same operation.
    pub fn encrypt_bytes(file_key: &[u8], data: &[u8], num: u32, gen: u16) -> Vec<u8> {
        rc4(&object_key(file_key, num, gen), data)
    }
}

impl SecurityHandler for StandardSecurityHandler {
    fn decrypt_string(&self, data: &[u8], num: u32, gen: u16) -> Vec<u8> {
        if !self.scope.strings {
            return data.to_vec();
        }
        rc4(&object_key(&self.file_key, num, gen), data)
    }

    fn decrypt_stream(&self, data: &[u8], num: u32, gen: u16) -> Vec<u8> {
        if !self.scope.streams {
            return data.to_vec();
        }
        rc4(&object_key(&self.file_key, num, gen), data)
    }

    fn permissions(&self) -> Permissions {
        self.permissions
    }

    fn opened_with_full_permission(&self) -> bool {
        self.owner_access
    }
}

/// The Adobe.PubSec certificate handler
#[derive(Clone)]
pub struct PublicKeySecurityHandler {
    file_key: Vec<u8>,
    permissions: Permissions,
    scope: CryptScope,
}

impl fmt::Debug for PublicKeySecurityHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeySecurityHandler")
            .field("key_length", &self.file_key.len())
            .field("permissions", &self.permissions)
            .finish()
    }
}

impl PublicKeySecurityHandler {
    pub fn open(encrypt: &PdfDictionary, props: &ReaderProperties) -> ParseResult<Self> {
        let (Some(certificate), Some(key), Some(recipient)) = (
            props.certificate.as_deref(),
            props.certificate_key.as_deref(),
            props.recipient.as_ref(),
        ) else {
            return Err(ParseError::CertificateRequired);
        };

        let recipients_array = encrypt.get_array("Recipients").or_else(|| {
            encrypt
                .get_dict("CF")
                .and_then(|cf| cf.get_dict("DefaultCryptFilter"))
                .and_then(|f| f.get_array("Recipients"))
        });
        let recipients: Vec<Vec<u8>> = recipients_array
            .map(|array| {
                array
                    .0
                    .iter()
                    .filter_map(PdfObject::as_string)
                    .map(|s| s.as_bytes().to_vec())
                    .collect()
            })
            .unwrap_or_default();
        if recipients.is_empty() {
            return Err(ParseError::MissingKey(
                "Recipients in encryption dictionary".to_string(),
            ));
        }

        let key_length = key_length(encrypt)?;
        let material = recipient.decrypt_file_key(&recipients, certificate, key, key_length)?;
        let mut file_key = material.file_key;
        file_key.truncate(key_length);

        Ok(Self {
            file_key,
            permissions: Permissions::from_bits_retain(material.permissions),
            scope: CryptScope::from_dict(encrypt),
        })
    }
}

impl SecurityHandler for PublicKeySecurityHandler {
    fn decrypt_string(&self, data: &[u8], num: u32, gen: u16) -> Vec<u8> {
        if !self.scope.strings {
            return data.to_vec();
        }
        rc4(&object_key(&self.file_key, num, gen), data)
    }

    fn decrypt_stream(&self, data: &[u8], num: u32, gen: u16) -> Vec<u8> {
        if !self.scope.streams {
            return data.to_vec();
        }
        rc4(&object_key(&self.file_key, num, gen), data)
    }

    fn permissions(&self) -> Permissions {
        self.permissions
    }

    fn opened_with_full_permission(&self) -> bool {
        self.permissions.contains(Permissions::all())
    }
}

/// Build the handler named by the encryption dictionary's `/Filter`.
pub(crate) fn open_security_handler(
    encrypt: &PdfDictionary,
    id: &[u8],
    props: &ReaderProperties,
) -> ParseResult<Box<dyn SecurityHandler>> {
    match encrypt.get_name("Filter") {
        Some("Standard") => {
            let password = props.password.as_deref().unwrap_or(&[]);
            Ok(Box::new(StandardSecurityHandler::open(encrypt, id, password)?))
        }
        Some("Adobe.PubSec") => Ok(Box::new(PublicKeySecurityHandler::open(encrypt, props)?)),
        other => Err(ParseError::EncryptionNotSupported(format!(
            "security handler {}",
            other.unwrap_or("<none>")
        ))),
    }
}
