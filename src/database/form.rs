use std::str::FromStr;

use super::error::TypeError;

pub type FormData = Vec<(String, String)>;

/// Query-string parameters, keeping repeated keys (`?tags=a&tags=b`).
#[derive(Debug, Clone, Default)]
pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn from_query(query: &str) -> Result<Self, TypeError> {
        serde_urlencoded::from_str::<FormData>(query)
            .map(Self::from_data)
            .map_err(|_e| TypeError::new("Malformed query string"))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, TypeError>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_e| TypeError::new(&format!("`{key}` must be a number"))),
            None => Ok(None),
        }
    }

    /// `1` and `true` switch a filter on, anything else leaves it off.
    pub fn get_flag(&self, key: &str) -> bool {
        matches!(self.get_str(key), Some("1") | Some("true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_repeated_keys() {
        let form = Form::from_query("tags=breakfast&tags=lunch&author=3").unwrap();

        assert_eq!(form.get_all("tags"), vec!["breakfast", "lunch"]);
        assert_eq!(form.get_number::<i32>("author").unwrap(), Some(3));
    }

    #[test]
    fn missing_and_empty_values_are_none() {
        let form = Form::from_query("name=&limit=").unwrap();

        assert_eq!(form.get_str("name"), None);
        assert_eq!(form.get_number::<i64>("limit").unwrap(), None);
        assert!(form.get_all("tags").is_empty());
    }

    #[test]
    fn rejects_non_numeric_values() {
        let form = Form::from_query("page=two").unwrap();

        let error = form.get_number::<i64>("page").unwrap_err();
        assert_eq!(error.info(), "`page` must be a number");
    }

    #[test]
    fn flags() {
        let form = Form::from_query("is_favorited=1&is_in_shopping_cart=0").unwrap();

        assert!(form.get_flag("is_favorited"));
        assert!(!form.get_flag("is_in_shopping_cart"));
        assert!(!form.get_flag("missing"));
    }

    #[test]
    fn decodes_percent_encoding() {
        let form = Form::from_query("name=%D1%81%D0%BE%D0%BB%D1%8C+%D0%BC").unwrap();

        assert_eq!(form.get_str("name"), Some("соль м"));
    }
}
