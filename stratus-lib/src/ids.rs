pub const UID_SIZE: usize = 16;
pub const UID_ALPHABET: [char; 63] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    '_'
];

/// identifier handed to us by the authentication collaborator
pub type OwnerId = String;
pub type NodeId = String;
pub type StorageRef = String;

pub fn create_uid() -> String {
    nanoid::format(nanoid::rngs::default, &UID_ALPHABET, UID_SIZE)
}

/// checks that the given string could have been produced by [`create_uid`]
pub fn uid_valid(given: &str) -> bool {
    let mut count = 0;

    for ch in given.chars() {
        if !UID_ALPHABET.contains(&ch) {
            return false;
        }

        count += 1;
    }

    count == UID_SIZE
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_uids_are_valid() {
        for _ in 0..32 {
            let uid = create_uid();

            assert!(uid_valid(&uid), "generated uid failed {:?}", uid);
        }
    }

    #[test]
    fn uid_validation() {
        let invalid = [
            "",
            "short",
            "0123456789abcdefg",
            "0123456789abcde-",
            "../../etc/passwd",
        ];

        for test in invalid {
            assert!(!uid_valid(test), "invalid string passed {:?}", test);
        }

        assert!(uid_valid("0123456789abcde_"));
    }
}
